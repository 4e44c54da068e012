use std::fs::{self, OpenOptions};
use std::path::PathBuf;
use std::sync::Arc;

use block_dev::{BlockDevice, DevError};
use ext2fs::{Corruption, Error, Ext2FileSystem, FormatOptions, InodeHandle, InodeMode, InodeNumber};

use super::{BlockFile, release_inode};

fn image(name: &str, len: u64) -> (PathBuf, Arc<dyn BlockDevice>) {
    let path = std::env::temp_dir().join(format!("ext2fs-{}-{name}.img", std::process::id()));
    let fd = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(true)
        .open(&path)
        .unwrap();
    fd.set_len(len).unwrap();
    (path, Arc::new(BlockFile::new(fd)))
}

fn reopen(path: &PathBuf) -> Arc<dyn BlockDevice> {
    let fd = OpenOptions::new().read(true).write(true).open(path).unwrap();
    Arc::new(BlockFile::new(fd))
}

#[test]
fn allocation_survives_remount() {
    let options = FormatOptions::default();
    let (path, dev) = image("remount", options.image_bytes());

    let ino = {
        let efs = Ext2FileSystem::format(dev, &options).unwrap();
        let mut efs = efs.lock();
        let (ino, mut inode) = efs.alloc_inode(InodeMode::regular(0o644)).unwrap();
        inode.set_mode(InodeMode::regular(0o644));
        inode.set_link_count(1);
        drop(inode);
        efs.sync().unwrap();
        ino
    };
    assert_eq!(InodeNumber::new(11), ino);

    let efs = Ext2FileSystem::open(reopen(&path)).unwrap();
    let efs = efs.lock();
    assert!(efs.is_allocated(ino).unwrap());
    assert_eq!(256 - 10 - 1, efs.state().free_inodes());
    let inode = efs.resolve(ino).unwrap();
    assert_eq!(InodeMode::regular(0o644), inode.mode());
    assert_eq!(1, inode.link_count());

    drop(inode);
    drop(efs);
    fs::remove_file(path).unwrap();
}

#[test]
fn short_image_reports_device_error() {
    let (path, dev) = image("short", 1024);

    let mut buf = [0u8; 1024];
    assert!(matches!(
        dev.read_block(1, &mut buf),
        Err(DevError::ShortTransfer { sector: 1, .. })
    ));
    assert_eq!(
        Some(Error::Io(DevError::ShortTransfer {
            sector: 2,
            done: 0,
            want: 1024
        })),
        Ext2FileSystem::open(dev).err()
    );

    fs::remove_file(path).unwrap();
}

fn tiny() -> FormatOptions {
    FormatOptions {
        block_size: 1024,
        groups: 2,
        inodes_per_group: 8,
        first_ino: 3,
    }
}

#[test]
fn refused_release_leaves_record_intact() {
    let options = tiny();
    let (path, dev) = image("refused", options.image_bytes());

    {
        let efs = Ext2FileSystem::format(dev, &options).unwrap();
        let mut efs = efs.lock();
        assert_eq!(
            Err(Error::Corruption(Corruption::OutOfRange {
                ino: InodeNumber::new(2),
                first: 3,
                last: 16,
            })),
            release_inode(&mut efs, InodeNumber::new(2))
        );
        efs.sync().unwrap();
    }

    let efs = Ext2FileSystem::open(reopen(&path)).unwrap();
    let efs = efs.lock();
    let root = efs.resolve(InodeNumber::new(2)).unwrap();
    assert!(root.mode().is_dir());
    assert_eq!(2, root.link_count());

    drop(root);
    drop(efs);
    fs::remove_file(path).unwrap();
}

#[test]
fn release_unlinks_after_freeing() {
    let options = tiny();
    let (path, dev) = image("release", options.image_bytes());

    {
        let efs = Ext2FileSystem::format(dev, &options).unwrap();
        let mut efs = efs.lock();
        let (ino, mut inode) = efs.alloc_inode(InodeMode::regular(0o644)).unwrap();
        inode.set_mode(InodeMode::regular(0o644));
        inode.set_link_count(1);
        drop(inode);

        release_inode(&mut efs, ino).unwrap();
        assert!(!efs.is_allocated(ino).unwrap());
        // 同一编号再次回收是致命的，记录不受影响
        assert!(release_inode(&mut efs, ino).unwrap_err().is_fatal());
        efs.sync().unwrap();
    }

    let efs = Ext2FileSystem::open(reopen(&path)).unwrap();
    let efs = efs.lock();
    let inode = efs.resolve(InodeNumber::new(3)).unwrap();
    assert_eq!(InodeMode::regular(0o644), inode.mode());
    assert_eq!(0, inode.link_count());
    assert_eq!(16 - 2, efs.state().free_inodes());

    drop(inode);
    drop(efs);
    fs::remove_file(path).unwrap();
}
