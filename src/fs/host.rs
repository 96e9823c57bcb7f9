//! 与宿主机目录之间的导入导出

use std::{fs, path::Path};
use tracing::{debug, info, trace, warn};

use crate::{
    disk::types::{DiskDensity, DiskDiameter},
    fs::{
        device::Device,
        error::{FileSystemError, Result},
        name::FsName,
        types::{BlockType, VolumeType},
    },
    utils::{is_hidden, last_component},
};

impl Device {
    /// 用宿主机目录生成一张软盘：先试 DD，放不下再试 HD
    pub fn make_with_directory(dos: VolumeType, path: &Path) -> Result<Self> {
        let mut last_err = FileSystemError::DiskFull;

        for density in [DiskDensity::Dd, DiskDensity::Hd] {
            let mut device = Self::make_with_floppy(DiskDiameter::Inch35, density, dos)?;
            if let Some(name) = last_component(path) {
                device.set_name(&FsName::new(&name));
            }
            match device.import_directory(path) {
                Ok(()) => {
                    device.change_dir("/")?;
                    return Ok(device);
                }
                Err(FileSystemError::DiskFull) => {
                    debug!(?density, "directory does not fit, trying a larger disk");
                    last_err = FileSystemError::DiskFull;
                }
                Err(e) => return Err(e),
            }
        }
        Err(last_err)
    }

    /// 把宿主机目录树导入当前目录，跳过隐藏文件
    pub fn import_directory(&mut self, path: &Path) -> Result<()> {
        let mut entries = fs::read_dir(path)?.collect::<std::io::Result<Vec<_>>>()?;
        entries.sort_by_key(|e| e.file_name());

        for entry in entries {
            let name = entry.file_name().to_string_lossy().into_owned();
            if is_hidden(&name) {
                trace!(name = %name, "skipping hidden entry");
                continue;
            }

            let file_type = entry.file_type()?;
            if file_type.is_dir() {
                debug!(name = %name, "importing directory");
                self.make_dir(&name)?;
                self.change_dir(&name)?;
                self.import_directory(&entry.path())?;
                self.change_dir("..")?;
            } else if file_type.is_file() {
                let bytes = fs::read(entry.path())?;
                debug!(name = %name, size = bytes.len(), "importing file");
                self.make_file(&name, &bytes)?;
            } else {
                warn!(name = %name, "skipping special file");
            }
        }
        Ok(())
    }

    /// 把当前目录下的整棵树导出到宿主机；目标必须不存在或为空
    pub fn export_directory(&self, path: &Path) -> Result<()> {
        if path.exists() {
            if !path.is_dir() {
                return Err(FileSystemError::NotADirectory(path.display().to_string()));
            }
            if fs::read_dir(path)?.next().is_some() {
                return Err(FileSystemError::DirectoryNotEmpty(path.display().to_string()));
            }
        }
        fs::create_dir_all(path)?;

        let cd = self.current_dir();
        let prefix = self.path_prefix(cd);
        let items = self.collect(cd, true)?;

        for &nr in &items {
            let full = self.get_path(nr);
            let rel = full.strip_prefix(&prefix).unwrap_or(&full);
            let target = path.join(rel);

            match self.block_type(nr) {
                BlockType::UserDir => fs::create_dir_all(&target)?,
                BlockType::FileHeader => fs::write(&target, self.read_file(nr)?)?,
                _ => {}
            }
        }

        info!(path = %path.display(), items = items.len(), "directory exported");
        Ok(())
    }
}
