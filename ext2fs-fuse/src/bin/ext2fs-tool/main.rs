mod cli;

use std::error::Error;
use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Arc;

use block_dev::BlockDevice;
use clap::Parser;
use cli::{Cli, Command};
use ext2fs::{
    Ext2FileSystem, FormatOptions, FreeIoPolicy, InodeHandle, InodeMode, InodeNumber, InodeTable,
    MountOptions,
};
use ext2fs_fuse::{BlockFile, release_inode};

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();
    let cli = Cli::parse();
    let free_io = if cli.swallow_free_errors {
        FreeIoPolicy::Swallow
    } else {
        FreeIoPolicy::Propagate
    };

    match cli.command {
        Command::Mkfs {
            block_size,
            groups,
            inodes_per_group,
            first_ino,
        } => mkfs(
            &cli.image,
            FormatOptions {
                block_size,
                groups,
                inodes_per_group,
                first_ino,
            },
        ),
        Command::Alloc { dir, count } => alloc(&cli.image, free_io, dir, count),
        Command::Free { ino } => free(&cli.image, free_io, ino.into()),
        Command::Stat => stat(&cli.image),
    }
}

type Efs = Arc<spin::Mutex<Ext2FileSystem>>;

fn mount(image: &Path, free_io: FreeIoPolicy) -> Result<Efs, Box<dyn Error>> {
    let fd = OpenOptions::new().read(true).write(true).open(image)?;
    let block_dev: Arc<dyn BlockDevice> = Arc::new(BlockFile::new(fd));
    let options = MountOptions {
        free_io,
        ..MountOptions::default()
    };
    Ok(Ext2FileSystem::open_with(block_dev, options, InodeTable)?)
}

fn mkfs(image: &Path, options: FormatOptions) -> Result<(), Box<dyn Error>> {
    options.validate()?;

    let fd = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(true)
        .open(image)?;
    fd.set_len(options.image_bytes())?;
    let block_dev: Arc<dyn BlockDevice> = Arc::new(BlockFile::new(fd));
    options.write(&block_dev)?;

    println!("image={image:?} blocks={}", options.total_blocks());
    Ok(())
}

fn alloc(image: &Path, free_io: FreeIoPolicy, dir: bool, count: usize) -> Result<(), Box<dyn Error>> {
    let efs = mount(image, free_io)?;
    let mut efs = efs.lock();
    let mode = if dir {
        InodeMode::directory(0o755)
    } else {
        InodeMode::regular(0o644)
    };

    for _ in 0..count {
        let (ino, mut inode) = efs.alloc_inode(mode)?;
        inode.set_mode(mode);
        inode.set_link_count(if dir { 2 } else { 1 });
        println!("{ino}");
    }
    efs.sync()?;
    Ok(())
}

fn free(image: &Path, free_io: FreeIoPolicy, ino: InodeNumber) -> Result<(), Box<dyn Error>> {
    let efs = mount(image, free_io)?;
    let mut efs = efs.lock();

    release_inode(&mut efs, ino)?;
    efs.sync()?;
    Ok(())
}

fn stat(image: &Path) -> Result<(), Box<dyn Error>> {
    let efs = mount(image, FreeIoPolicy::default())?;
    let efs = efs.lock();
    let state = efs.state();

    println!(
        "inodes={} free={} read_only={}",
        state.total_inodes(),
        state.free_inodes(),
        state.is_read_only()
    );
    for (group, desc) in state.groups().iter().enumerate() {
        println!(
            "group {group}: free={} dirs={} bitmap={}",
            desc.free_inodes(),
            desc.dir_count(),
            desc.bitmap_block()
        );
    }
    Ok(())
}
