use amiga_fs::{
    disk::{
        types::{DiskDensity, DiskDiameter},
        BlockStore,
    },
    fs::{block::DataRefs, Block, BlockType, Device, FileSystemError, VolumeType},
};

fn dd(dos: VolumeType) -> Device {
    Device::make_with_floppy(DiskDiameter::Inch35, DiskDensity::Dd, dos).unwrap()
}

fn pattern(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i * 7 + i / 251) as u8).collect()
}

fn round_trip(dos: VolumeType, len: usize) {
    let mut device = dd(dos);
    let free = device.free_blocks();
    let required = device.current_partition().required_blocks(len);

    let bytes = pattern(len);
    let nr = device.make_file("data", &bytes).unwrap();

    assert_eq!(device.read_file(nr).unwrap(), bytes, "{dos} {len}");
    assert_eq!(device.free_blocks(), free - required, "{dos} {len}");
    let report = device.check(true);
    assert!(report.is_clean(), "{dos} {len}: {report:?}");
}

#[test]
fn empty_file() {
    round_trip(VolumeType::Ofs, 0);
    round_trip(VolumeType::Ffs, 0);
}

#[test]
fn single_block_file() {
    round_trip(VolumeType::Ofs, 488);
    round_trip(VolumeType::Ffs, 512);
}

#[test]
fn multi_block_file() {
    round_trip(VolumeType::Ofs, 489);
    round_trip(VolumeType::Ffs, 5000);
}

#[test]
fn file_with_list_blocks() {
    // 超过 72 个数据块，需要文件扩展块
    round_trip(VolumeType::Ofs, 488 * 200 + 17);
    round_trip(VolumeType::Ffs, 512 * 150);
}

#[test]
fn list_blocks_record_the_first_data_block_of_the_file() {
    for (dos, len) in [(VolumeType::Ofs, 488 * 200), (VolumeType::Ffs, 512 * 150)] {
        let mut device = dd(dos);
        let nr = device.make_file("long", &pattern(len)).unwrap();
        let header = device.block(nr).and_then(Block::as_data_refs).unwrap();
        let first = header.first_data_block_ref();
        assert_eq!(first, header.data_block_ref(0));

        let mut lists = 0;
        let mut next = header.next_list_block_ref();
        while next != 0 {
            let list = device.block(next).and_then(Block::as_data_refs).unwrap();
            assert_eq!(device.block_type(next), BlockType::FileList);
            assert_eq!(list.first_data_block_ref(), first, "{dos}: list block {next}");
            assert_ne!(list.data_block_ref(0), first);
            lists += 1;
            next = list.next_list_block_ref();
        }
        assert_eq!(lists, device.current_partition().required_file_list_blocks(len));
    }
}

#[test]
fn ofs_data_blocks_are_linked() {
    let mut device = dd(VolumeType::Ofs);
    let nr = device.make_file("chain", &pattern(488 * 3)).unwrap();
    let refs = device
        .block(nr)
        .and_then(Block::as_data_refs)
        .unwrap()
        .data_block_refs();
    assert_eq!(refs.len(), 3);

    for (i, &r) in refs.iter().enumerate() {
        let data = device.block(r).and_then(Block::as_ofs_data).unwrap();
        assert_eq!(data.file_header_ref(), nr);
        assert_eq!(data.data_block_nr(), i as u32 + 1);
        assert_eq!(data.data_bytes_in_block(), 488);
        let next = refs.get(i + 1).copied().unwrap_or(0);
        assert_eq!(data.next_data_block_ref(), next);
    }
}

#[test]
fn allocation_exhaustion_returns_zero() {
    let mut device = dd(VolumeType::Ffs);
    let p = device.current_partition().clone();

    loop {
        let nr = p.allocate_block(&mut device);
        if nr == 0 {
            break;
        }
        let block = Block::make_with_type(&p, nr, BlockType::DataFfs).unwrap();
        device.replace(block).unwrap();
    }
    assert_eq!(device.free_blocks(), 0);

    let before = device.clone();
    for _ in 0..3 {
        assert_eq!(p.allocate_block(&mut device), 0);
    }
    assert!((0..device.num_blocks() as u32).all(|nr| before.block(nr) == device.block(nr)));
    assert_eq!(p.check(&device), 0);
}

#[test]
fn disk_full_leaves_device_untouched() {
    let mut device = dd(VolumeType::Ffs);
    let free = device.free_blocks();

    // 文件头 + 数据块 + 扩展块正好多出一块
    let too_big = vec![1; (free - 1) * 512];
    assert!(matches!(
        device.make_file("big", &too_big),
        Err(FileSystemError::DiskFull)
    ));
    assert_eq!(device.free_blocks(), free);
    assert!(device.collect(880, false).unwrap().is_empty());

    let fits = device.current_partition().required_blocks(100 * 512);
    assert!(fits < free);
    device.make_file("ok", &vec![2; 100 * 512]).unwrap();
    assert_eq!(device.free_blocks(), free - fits);
}

#[test]
fn deallocated_blocks_become_empty_and_free() {
    let mut device = dd(VolumeType::Ofs);
    let p = device.current_partition().clone();
    let nr = p.allocate_block(&mut device);
    device
        .replace(Block::make_with_type(&p, nr, BlockType::DataOfs).unwrap())
        .unwrap();
    assert!(!p.is_free(&device, nr));

    p.deallocate_block(&mut device, nr).unwrap();
    assert_eq!(device.block_type(nr), BlockType::Empty);
    assert!(p.is_free(&device, nr));
    assert!(matches!(
        p.deallocate_block(&mut device, 5000),
        Err(FileSystemError::OutOfRange(5000))
    ));
}
