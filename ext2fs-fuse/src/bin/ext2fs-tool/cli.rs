use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
pub struct Cli {
    /// Filesystem image
    #[arg(long, short)]
    pub image: PathBuf,

    /// Log and ignore I/O errors while freeing inodes
    #[arg(long, global = true)]
    pub swallow_free_errors: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Create a fresh filesystem image
    Mkfs {
        #[arg(long, default_value_t = 1024)]
        block_size: usize,
        #[arg(long, default_value_t = 1)]
        groups: usize,
        #[arg(long, default_value_t = 256)]
        inodes_per_group: u32,
        /// First inode number handed out to files
        #[arg(long, default_value_t = 11)]
        first_ino: u32,
    },
    /// Allocate inodes and print their numbers
    Alloc {
        /// Allocate directories instead of regular files
        #[arg(long)]
        dir: bool,
        #[arg(long, short, default_value_t = 1)]
        count: usize,
    },
    /// Release an allocated inode
    Free {
        #[arg(long)]
        ino: u32,
    },
    /// Print inode counters per group
    Stat,
}
