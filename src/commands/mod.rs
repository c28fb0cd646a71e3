pub mod distribution_cmds;
