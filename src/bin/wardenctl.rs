//! wardenctl - Warden exerciser utility

use std::io::BufRead;
use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::info;

use warden::{FileStatus, PidLock};

/// Warden control utility
#[derive(Parser)]
#[command(name = "wardenctl", version, about = "Exercise Warden lock files and file status")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Debug logging
    #[arg(short, long)]
    debug: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Acquire one or more lock files, hold them until enter is pressed,
    /// then release them all
    Lock {
        /// Lock file paths
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },

    /// Print the file status record for a path
    Stat {
        /// Path to stat
        path: PathBuf,

        /// Describe a symlink itself instead of its target
        #[arg(short, long)]
        no_follow: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.debug { "debug" } else { "info" };
    tracing_subscriber::fmt().with_env_filter(log_level).init();

    match cli.command {
        Commands::Lock { paths } => hold_locks(paths),
        Commands::Stat { path, no_follow } => print_stat(path, no_follow),
    }
}

fn hold_locks(paths: Vec<PathBuf>) -> Result<()> {
    let mut locks = Vec::with_capacity(paths.len());
    for path in paths {
        let lock = PidLock::acquire(&path)?;
        info!("locked {}", path.display());
        locks.push(lock);
    }

    println!("{} lock(s) held, press enter to release", locks.len());
    let mut line = String::new();
    std::io::stdin().lock().read_line(&mut line)?;

    for mut lock in locks {
        lock.release();
    }
    Ok(())
}

fn print_stat(path: PathBuf, no_follow: bool) -> Result<()> {
    let st = if no_follow {
        FileStatus::of_link(&path)?
    } else {
        FileStatus::of(&path)?
    };

    println!("File:    {}", path.display());
    println!("Type:    {}", type_name(&st));
    println!("Mode:    {:04o}", st.permission_bits());
    println!("Owner:   {}:{}", st.uid, st.gid);
    println!("Size:    {} bytes ({} blocks)", st.size, st.blocks);
    println!("Device:  {} inode {} links {}", st.dev, st.ino, st.nlink);
    println!("Access:  {:?}", st.accessed());
    println!("Modify:  {:?}", st.modified());
    println!("Change:  {:?}", st.changed());
    Ok(())
}

fn type_name(st: &FileStatus) -> &'static str {
    if st.is_regular() {
        "regular file"
    } else if st.is_directory() {
        "directory"
    } else if st.is_symlink() {
        "symbolic link"
    } else if st.is_char_device() {
        "character device"
    } else if st.is_block_device() {
        "block device"
    } else if st.is_fifo() {
        "fifo"
    } else if st.is_socket() {
        "socket"
    } else {
        "unknown"
    }
}
