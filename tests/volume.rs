use amiga_fs::{
    disk::{
        types::{DiskDensity, DiskDiameter},
        AdfFile, DeviceDescriptor, DiskImage, HdfFile,
    },
    fs::{BlockType, Device, FileSystemError, FsName, VolumeType},
};

fn populated(dos: VolumeType) -> Device {
    let mut device = Device::make_with_floppy(DiskDiameter::Inch35, DiskDensity::Dd, dos).unwrap();
    device.set_name(&FsName::new("Workbench"));
    device.make_dir("devs").unwrap();
    device.make_dir("s").unwrap();
    device.change_dir("s").unwrap();
    device.make_file("startup-sequence", b"LoadWB\nEndCLI\n").unwrap();
    device.change_dir("/").unwrap();
    let big: Vec<u8> = (0..100_000u32).map(|i| (i % 253 + 1) as u8).collect();
    device.make_file("big", &big).unwrap();
    device.make_bootable().unwrap();
    device
}

#[test]
fn export_import_round_trip() {
    for dos in [VolumeType::Ofs, VolumeType::Ffs] {
        let mut device = populated(dos);
        let mut first = vec![0; device.num_bytes()];
        device.export_volume(&mut first).unwrap();

        let mut copy = Device::make_with_layout(&device.descriptor(), &first).unwrap();
        let mut second = vec![0; copy.num_bytes()];
        copy.export_volume(&mut second).unwrap();

        assert!(first == second, "{dos}: exported images differ");
        let report = copy.check(true);
        assert!(report.is_clean(), "{dos}: {report:?}");

        assert_eq!(copy.name().to_string(), "Workbench");
        copy.change_dir("s").unwrap();
        let nr = copy.seek_file(&FsName::new("startup-sequence"));
        assert_eq!(copy.read_file(nr).unwrap(), b"LoadWB\nEndCLI\n");
    }
}

/// 每块数据：先两块全零，再是形似根块、目录块、文件头、扩展块的内容
fn look_alike_payload(per_block: usize) -> Vec<u8> {
    let mut bytes = vec![0; per_block * 2];
    for (ty, subtype) in [(2u32, 1u32), (2, 2), (2, 0xFFFF_FFFD), (16, 0xFFFF_FFFD)] {
        let mut block = vec![0; per_block];
        block[..4].copy_from_slice(&ty.to_be_bytes());
        block[per_block - 4..].copy_from_slice(&subtype.to_be_bytes());
        bytes.extend(block);
    }
    bytes
}

#[test]
fn data_blocks_keep_their_type_whatever_they_contain() {
    for (dos, per_block) in [(VolumeType::Ofs, 488), (VolumeType::Ffs, 512)] {
        let mut device = Device::make_with_floppy(DiskDiameter::Inch35, DiskDensity::Dd, dos).unwrap();

        let mut sparse = vec![0; 1024];
        sparse[1000] = 1;
        let files = [
            ("sparse", sparse),
            ("zeros", vec![0; per_block * 80]),
            ("look-alike", look_alike_payload(per_block)),
        ];
        for (name, bytes) in &files {
            device.make_file(name, bytes).unwrap();
        }

        let mut first = vec![0; device.num_bytes()];
        device.export_volume(&mut first).unwrap();
        let mut copy = Device::make_with_layout(&device.descriptor(), &first).unwrap();

        for nr in 0..device.num_blocks() as u32 {
            assert_eq!(copy.block_type(nr), device.block_type(nr), "{dos}: block {nr}");
        }
        let report = copy.check(true);
        assert!(report.is_clean(), "{dos}: {report:?}");
        assert_eq!(copy.free_blocks(), device.free_blocks());

        for (name, bytes) in &files {
            let nr = copy.seek_file(&FsName::new(name));
            assert_eq!(&copy.read_file(nr).unwrap(), bytes, "{dos}: {name}");
        }

        let mut second = vec![0; copy.num_bytes()];
        copy.export_volume(&mut second).unwrap();
        assert!(first == second, "{dos}: exported images differ");
    }
}

#[test]
fn imported_blocks_get_their_types_back() {
    let mut device = populated(VolumeType::Ofs);
    let mut bytes = vec![0; device.num_bytes()];
    device.export_volume(&mut bytes).unwrap();
    let copy = Device::make_with_layout(&device.descriptor(), &bytes).unwrap();

    for nr in 0..device.num_blocks() as u32 {
        assert_eq!(copy.block_type(nr), device.block_type(nr), "block {nr}");
    }
}

#[test]
fn adf_round_trip() {
    let mut device = populated(VolumeType::Ffs);
    let adf = AdfFile::from_device(&mut device).unwrap();
    assert_eq!(adf.dos(0), VolumeType::Ffs);

    let copy = Device::make_with_image(&adf).unwrap();
    assert_eq!(copy.dos(), VolumeType::Ffs);
    assert_eq!(copy.free_blocks(), device.free_blocks());
    assert!(copy.check(true).is_clean());
}

#[test]
fn nodos_image_is_rejected() {
    let adf = AdfFile::from_bytes(vec![0; 901_120]).unwrap();
    assert!(matches!(
        Device::make_with_image(&adf),
        Err(FileSystemError::Unsupported(_))
    ));
}

#[test]
fn hdf_round_trip() {
    // 小硬盘：40 个柱面 × 1 个磁头 × 32 个扇区
    let desc = DeviceDescriptor::new(40, 1, 32, 512, VolumeType::Ffs);
    let mut device = Device::make_with_format(&desc).unwrap();
    device.make_dir("work").unwrap();
    device.change_dir("work").unwrap();
    device.make_file("notes", b"hard disk").unwrap();

    let hdf = HdfFile::from_device(&mut device).unwrap();
    assert_eq!(hdf.num_cyls(), 40);
    assert_eq!(hdf.layout().unwrap(), desc);

    let mut copy = Device::make_with_image(&hdf).unwrap();
    assert!(copy.check(true).is_clean());
    copy.change_dir("/work").unwrap();
    let nr = copy.seek_file(&FsName::new("notes"));
    assert_eq!(copy.read_file(nr).unwrap(), b"hard disk");
}

#[test]
fn large_hdf_uses_bitmap_extension_blocks() {
    let desc = DeviceDescriptor::new(3300, 1, 32, 512, VolumeType::Ofs);
    assert_eq!(desc.partitions[0].bm_blocks.len(), 26);
    assert_eq!(desc.partitions[0].bm_ext_blocks.len(), 1);

    let mut device = Device::make_with_format(&desc).unwrap();
    let ext = desc.partitions[0].bm_ext_blocks[0];
    assert_eq!(device.block_type(ext), BlockType::BitmapExt);
    assert_eq!(device.current_partition().check(&device), 0);

    // 最后一个块的分配位位于第 26 个位图块
    let last = device.num_blocks() as u32 - 1;
    let (bm, _, _) = device.current_partition().locate_allocation_bit(last).unwrap();
    assert_eq!(bm, desc.partitions[0].bm_blocks[25]);
    assert!(device.current_partition().is_free(&device, last));

    let hdf = HdfFile::from_device(&mut device).unwrap();
    assert_eq!(hdf.layout().unwrap(), desc);
}

#[test]
fn layout_sidecar_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("disk.layout");

    let device = populated(VolumeType::Ofs);
    device.descriptor().save(&path).unwrap();
    assert_eq!(DeviceDescriptor::load(&path).unwrap(), device.descriptor());
}

#[test]
fn export_single_blocks() {
    let mut device = populated(VolumeType::Ofs);
    let mut buf = vec![0; 2 * 512];
    device.export_blocks(880, 881, &mut buf).unwrap();
    assert_eq!(&buf[..4], &[0, 0, 0, 2]);

    assert!(matches!(
        device.export_blocks(881, 880, &mut buf),
        Err(FileSystemError::OutOfRange(_))
    ));
    assert!(matches!(
        device.export_blocks(0, 2, &mut buf),
        Err(FileSystemError::WrongCapacity { .. })
    ));
}
