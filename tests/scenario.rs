use amiga_fs::{
    disk::types::{DiskDensity, DiskDiameter},
    fs::{
        block::{DirEntry, HashTable},
        Block, BlockType, Device, FileSystemError, FsName, VolumeType,
    },
};

fn floppy(density: DiskDensity, dos: VolumeType) -> Device {
    Device::make_with_floppy(DiskDiameter::Inch35, density, dos).unwrap()
}

#[test]
fn make_dir_and_file_on_dd_ofs() {
    let mut device = floppy(DiskDensity::Dd, VolumeType::Ofs);
    let free = device.free_blocks();

    device.make_dir("games").unwrap();
    device.change_dir("games").unwrap();
    let file = device.make_file("x", b"hello").unwrap();

    assert_eq!(device.free_blocks(), free - 3);
    assert_eq!(device.get_path(file), "games/x");
    assert_eq!(device.read_file(file).unwrap(), b"hello");

    let report = device.check(true);
    assert!(report.is_clean(), "{report:?}");
}

#[test]
fn hd_floppy_layout() {
    let device = floppy(DiskDensity::Hd, VolumeType::Ffs);
    assert_eq!(device.num_blocks(), 3520);
    assert_eq!(device.current_partition().root_block, 1760);
    assert_eq!(device.current_partition().bm_blocks, vec![1761]);
    assert_eq!(device.free_blocks(), 3520 - 4);
}

#[test]
fn five_inch_hd_is_unsupported() {
    assert!(matches!(
        Device::make_with_floppy(DiskDiameter::Inch525, DiskDensity::Hd, VolumeType::Ofs),
        Err(FileSystemError::Unsupported(_))
    ));
}

#[test]
fn colliding_names_are_chained_in_insertion_order() {
    let mut device = floppy(DiskDensity::Dd, VolumeType::Ffs);
    // 这些名字的哈希值模 72 都是 29
    let names = ["file_an", "file_ba", "file_fu", "file_gh", "file_lo", "x"];
    for name in names {
        assert_eq!(FsName::new(name).hash_value() % 72, 29);
    }

    let blocks: Vec<_> = names
        .iter()
        .map(|name| device.make_file(name, name.as_bytes()).unwrap())
        .collect();

    for (name, &nr) in names.iter().zip(&blocks) {
        assert_eq!(device.seek_file(&FsName::new(name)), nr);
        assert_eq!(device.read_file(nr).unwrap(), name.as_bytes());
    }

    let root = device.block(880).and_then(Block::as_hash_table).unwrap();
    assert_eq!(root.hash_ref(29), blocks[0]);
    assert_eq!(device.last_hash_block_in_chain(blocks[0]).unwrap(), blocks[5]);
    assert_eq!(device.collect(880, false).unwrap(), blocks);
    assert!(device.check(true).is_clean());
}

#[test]
fn collect_walks_slots_in_order_and_recurses() {
    let mut device = floppy(DiskDensity::Dd, VolumeType::Ofs);
    let s = device.make_dir("s").unwrap();
    device.change_dir("s").unwrap();
    let startup = device.make_file("startup-sequence", b"echo hi").unwrap();
    device.change_dir("/").unwrap();
    let c = device.make_dir("c").unwrap();

    let flat = device.collect(880, false).unwrap();
    assert_eq!(flat.len(), 2);
    assert!(flat.contains(&s) && flat.contains(&c));

    let all = device.collect(880, true).unwrap();
    assert_eq!(all.len(), 3);
    let pos = |nr| all.iter().position(|&b| b == nr).unwrap();
    assert_eq!(pos(startup), pos(s) + 1);
}

#[test]
fn self_referencing_hash_chain_is_reported() {
    let mut device = floppy(DiskDensity::Dd, VolumeType::Ofs);
    let games = device.make_dir("games").unwrap();
    device
        .block_mut(games)
        .and_then(Block::as_entry_mut)
        .unwrap()
        .set_next_hash_ref(games);

    assert!(matches!(
        device.collect(880, true),
        Err(FileSystemError::HasCycles)
    ));
    assert!(matches!(
        device.last_hash_block_in_chain(games),
        Err(FileSystemError::HasCycles)
    ));
    assert!(matches!(device.list_directory(false), Err(FileSystemError::HasCycles)));
    // 查找不存在的名字不会死循环
    assert_eq!(device.seek_ref(&FsName::new("GAMES2")), 0);
}

#[test]
fn parent_cycle_does_not_hang_get_path() {
    let mut device = floppy(DiskDensity::Dd, VolumeType::Ofs);
    let a = device.make_dir("a").unwrap();
    device.change_dir("a").unwrap();
    let b = device.make_dir("b").unwrap();
    device
        .block_mut(a)
        .and_then(Block::as_entry_mut)
        .unwrap()
        .set_parent_dir_ref(b);

    assert_eq!(device.get_path(b), "a/b");
    assert_eq!(device.block_type(b), BlockType::UserDir);
}

#[test]
fn bootable_disk_checks_clean() {
    let mut device = floppy(DiskDensity::Dd, VolumeType::Ffs);
    device.make_bootable().unwrap();
    assert_eq!(device.block(0).unwrap().get32(1), 0xC020_0F18);
    assert!(device.check(true).is_clean());

    device.block_mut(0).unwrap().set32(20, 0xDEAD_BEEF);
    let report = device.check(true);
    assert!(report.is_corrupted(0));

    device.kill_virus().unwrap();
    assert!(device.check(true).is_clean());
}
