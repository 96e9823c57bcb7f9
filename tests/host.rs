use std::fs;

use amiga_fs::{
    disk::types::{DiskDensity, DiskDiameter},
    fs::{Device, FileSystemError, FsName, VolumeType},
};

fn host_tree() -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    fs::create_dir_all(root.join("s")).unwrap();
    fs::create_dir_all(root.join("libs/fonts")).unwrap();
    fs::write(root.join("s/startup-sequence"), b"LoadWB\n").unwrap();
    fs::write(root.join("libs/fonts/topaz.font"), vec![0x55; 3000]).unwrap();
    fs::write(root.join("readme"), b"hello").unwrap();
    fs::write(root.join("zz-last"), b"").unwrap();
    fs::write(root.join(".hidden"), b"secret").unwrap();
    dir
}

#[test]
fn import_then_export_directory() {
    let src = host_tree();
    let mut device =
        Device::make_with_floppy(DiskDiameter::Inch35, DiskDensity::Dd, VolumeType::Ofs).unwrap();
    device.import_directory(src.path()).unwrap();
    assert!(device.check(true).is_clean());

    // 每个子目录导入后都回到了上一级，兄弟项落在根目录
    assert_eq!(device.current_dir(), 880);
    assert_ne!(device.seek_file(&FsName::new("readme")), 0);
    assert_ne!(device.seek_file(&FsName::new("zz-last")), 0);
    assert_eq!(device.seek_ref(&FsName::new(".hidden")), 0);

    let dst = tempfile::tempdir().unwrap();
    let out = dst.path().join("out");
    device.export_directory(&out).unwrap();

    assert_eq!(fs::read(out.join("s/startup-sequence")).unwrap(), b"LoadWB\n");
    assert_eq!(fs::read(out.join("libs/fonts/topaz.font")).unwrap(), vec![0x55; 3000]);
    assert_eq!(fs::read(out.join("readme")).unwrap(), b"hello");
    assert!(fs::read(out.join("zz-last")).unwrap().is_empty());
    assert!(!out.join(".hidden").exists());
}

#[test]
fn export_of_subdirectory_is_relative() {
    let src = host_tree();
    let mut device =
        Device::make_with_floppy(DiskDiameter::Inch35, DiskDensity::Dd, VolumeType::Ffs).unwrap();
    device.import_directory(src.path()).unwrap();
    device.change_dir("libs").unwrap();

    let dst = tempfile::tempdir().unwrap();
    device.export_directory(dst.path()).unwrap();
    assert!(dst.path().join("fonts/topaz.font").is_file());
    assert!(!dst.path().join("readme").exists());
}

#[test]
fn export_requires_empty_target() {
    let device =
        Device::make_with_floppy(DiskDiameter::Inch35, DiskDensity::Dd, VolumeType::Ofs).unwrap();
    let dst = tempfile::tempdir().unwrap();
    fs::write(dst.path().join("occupied"), b"x").unwrap();

    assert!(matches!(
        device.export_directory(dst.path()),
        Err(FileSystemError::DirectoryNotEmpty(_))
    ));
}

#[test]
fn make_with_directory_picks_a_disk_that_fits() {
    let src = host_tree();
    let device = Device::make_with_directory(VolumeType::Ofs, src.path()).unwrap();
    assert_eq!(device.num_blocks(), 1760);
    let volume = src.path().file_name().unwrap().to_string_lossy().into_owned();
    assert_eq!(device.name(), FsName::new(&volume));

    // DD 放不下 1 MB，自动换成 HD
    let big = tempfile::tempdir().unwrap();
    fs::write(big.path().join("blob"), vec![7; 1_000_000]).unwrap();
    let device = Device::make_with_directory(VolumeType::Ffs, big.path()).unwrap();
    assert_eq!(device.num_blocks(), 3520);
    let nr = device.seek_file(&FsName::new("blob"));
    assert_eq!(device.read_file(nr).unwrap().len(), 1_000_000);
}
