use amiga_fs::{
    disk::{
        types::{DiskDensity, DiskDiameter},
        AdfFile, DeviceDescriptor, DiskImage, HdfFile,
    },
    fs::{Device, FsName, VolumeType},
};
use colored::*;
use dialoguer::Confirm;
use indicatif::{ProgressBar, ProgressStyle};
use std::{
    error::Error,
    path::{Path, PathBuf},
    time::Duration,
};

#[derive(Debug)]
pub enum Command {
    Help,
    Format(DiskDensity, VolumeType),
    Open(String),
    Save(String),
    Info,
    Ls { recursive: bool },
    Cd(String),
    Pwd,
    Mkdir(String),
    Write(String, String),
    Read(String),
    Import(String),
    Export(String),
    Check { strict: bool },
    Boot,
    Exit,
}

/// 交互会话：当前设备和它对应的镜像文件
pub struct Session {
    pub device: Device,
    pub image: Option<PathBuf>,
    pub dirty: bool,
}

impl Session {
    pub fn new(device: Device) -> Self {
        Self {
            device,
            image: None,
            dirty: false,
        }
    }

    /// 提示符里显示的路径
    pub fn pwd(&self) -> String {
        format!("{}:{}", self.device.name(), self.device.get_path(self.device.current_dir()))
    }
}

/// 镜像旁边保存布局的 sidecar 文件
fn layout_path(image: &Path) -> PathBuf {
    let mut name = image.as_os_str().to_owned();
    name.push(".layout");
    PathBuf::from(name)
}

fn is_hdf(path: &Path) -> bool {
    path.extension()
        .is_some_and(|e| e.eq_ignore_ascii_case("hdf"))
}

fn spinner(msg: &str) -> Result<ProgressBar, Box<dyn Error>> {
    let pb = ProgressBar::new_spinner();
    pb.set_style(ProgressStyle::with_template("{spinner:.cyan} {msg}")?);
    pb.set_message(msg.to_string());
    pb.enable_steady_tick(Duration::from_millis(80));
    Ok(pb)
}

/// 有未保存的修改时先确认
fn confirm_discard(session: &Session) -> Result<bool, Box<dyn Error>> {
    if !session.dirty {
        return Ok(true);
    }
    Ok(Confirm::new()
        .with_prompt("The current disk has unsaved changes. Discard them?")
        .default(false)
        .interact()?)
}

pub fn execute_command(cmd: &Command, session: &mut Session) -> Result<(), Box<dyn Error>> {
    match cmd {
        Command::Help => print_help(),
        Command::Format(density, dos) => {
            if !confirm_discard(session)? {
                return Ok(());
            }
            let pb = spinner("💾 Formatting virtual disk...")?;
            let device = Device::make_with_floppy(DiskDiameter::Inch35, *density, *dos)?;
            *session = Session::new(device);
            pb.finish_with_message(format!(
                "✅ Formatted {:?} {} disk ({} blocks)",
                density,
                dos,
                session.device.num_blocks()
            ));
        }
        Command::Open(path) => {
            if !confirm_discard(session)? {
                return Ok(());
            }
            let path = PathBuf::from(path);
            let pb = spinner(&format!("📀 Opening {}...", path.display()))?;

            let sidecar = layout_path(&path);
            let device = if sidecar.exists() {
                let desc = DeviceDescriptor::load(&sidecar)?;
                Device::make_with_layout(&desc, &std::fs::read(&path)?)?
            } else if is_hdf(&path) {
                Device::make_with_image(&HdfFile::from_path(&path)?)?
            } else {
                Device::make_with_image(&AdfFile::from_path(&path)?)?
            };

            *session = Session::new(device);
            session.image = Some(path);
            pb.finish_with_message(format!("✅ Opened volume {}", session.device.name()));
        }
        Command::Save(path) => {
            let path = PathBuf::from(path);
            if path.exists()
                && !Confirm::new()
                    .with_prompt(format!("{} exists. Overwrite?", path.display()))
                    .default(false)
                    .interact()?
            {
                return Ok(());
            }

            if is_hdf(&path) {
                HdfFile::from_device(&mut session.device)?.write_to_file(&path)?;
            } else {
                AdfFile::from_device(&mut session.device)?.write_to_file(&path)?;
            }
            session.device.descriptor().save(&layout_path(&path))?;
            session.image = Some(path.clone());
            session.dirty = false;
            println!("💾 Saved to {}", path.display().to_string().green());
        }
        Command::Info => print_info(&session.device),
        Command::Ls { recursive } => {
            let items = session.device.list_directory(*recursive)?;
            if items.is_empty() {
                println!("{}", "(empty)".bright_black());
            }
            for item in items {
                if item.is_dir {
                    println!("📁  {}", item.path.blue().bold());
                } else {
                    println!(
                        "📄  {} {}",
                        item.path,
                        format!("({} bytes)", item.size).bright_black()
                    );
                }
            }
        }
        Command::Cd(path) => {
            session.device.change_dir(path)?;
            println!("📂 Moved to {}", session.pwd().blue());
        }
        Command::Pwd => println!("📍 {}", session.pwd().cyan()),
        Command::Mkdir(name) => {
            session.device.make_dir(name)?;
            session.dirty = true;
            println!("✅ Created directory: {}", name.green());
        }
        Command::Write(name, content) => {
            let nr = session.device.make_file(name, content.as_bytes())?;
            session.dirty = true;
            println!(
                "✏️  Wrote {} bytes to {} (block {})",
                content.len(),
                name.cyan(),
                nr
            );
        }
        Command::Read(name) => {
            let nr = session.device.seek_file(&FsName::new(name));
            if nr == 0 {
                return Err(format!("file not found: {name}").into());
            }
            let bytes = session.device.read_file(nr)?;
            println!("{}", String::from_utf8_lossy(&bytes));
        }
        Command::Import(dir) => {
            let pb = spinner(&format!("📥 Importing {dir}..."))?;
            let result = session.device.import_directory(Path::new(dir));
            session.dirty = true;
            match result {
                Ok(()) => pb.finish_with_message(format!(
                    "✅ Imported, {} blocks free",
                    session.device.free_blocks()
                )),
                Err(e) => {
                    pb.abandon_with_message("❌ Import stopped");
                    return Err(e.into());
                }
            }
        }
        Command::Export(dir) => {
            let pb = spinner(&format!("📤 Exporting to {dir}..."))?;
            session.device.export_directory(Path::new(dir))?;
            pb.finish_with_message("✅ Exported".to_string());
        }
        Command::Check { strict } => {
            let report = session.device.check(*strict);
            if report.is_clean() {
                println!("{}", "✅ No errors found".green());
            } else {
                println!(
                    "{} {} bitmap errors, {} corrupted blocks",
                    "⚠️ ".yellow(),
                    report.bitmap_errors(),
                    report.corrupted_blocks()
                );
                for &nr in report.corrupted().iter().take(10) {
                    println!(
                        "   block {:>5}  {:<18} {} bad bytes",
                        nr,
                        session.device.block_type(nr).to_string(),
                        session.device.check_block(nr, *strict)
                    );
                }
            }
        }
        Command::Boot => {
            session.device.make_bootable()?;
            session.dirty = true;
            println!("🥾 Installed boot block on {}", session.device.name());
        }
        Command::Exit => {
            if session.dirty {
                println!("{}", "⚠️  Unsaved changes are discarded.".yellow());
            }
            println!("{}", "👋 Exiting Amiga FS shell...".yellow().bold());
        }
    }

    Ok(())
}

fn print_info(device: &Device) {
    let p = device.current_partition();
    println!("{}", "📊 Volume Info".bright_yellow().bold());
    println!("{}: {}", "Name".blue(), device.name());
    println!("{}: {}", "Type".blue(), device.dos());
    println!(
        "{}: {} cyls, {} heads, {} sectors, {} bytes per block",
        "Geometry".blue(),
        device.num_cyls(),
        device.num_heads(),
        device.num_sectors(),
        device.bsize()
    );
    println!(
        "{}: {} (bitmap {:?})",
        "Root block".blue(),
        p.root_block,
        p.bm_blocks
    );
    println!(
        "{}: {} used, {} free ({} bytes free)",
        "Blocks".blue(),
        device.used_blocks(),
        device.free_blocks(),
        device.free_bytes()
    );
}

fn print_help() {
    println!("{}", "📘 Amiga FS Commands".bright_cyan().bold());
    println!(
        "{}",
        "
  format [dd|hd] [ofs|ffs]  Create a blank floppy disk
  open <file.adf|file.hdf>  Open a disk image
  save <file.adf|file.hdf>  Save the disk image
  info                      Show volume information
  ls [-r]                   List directory (recursively with -r)
  cd <dir>                  Change directory ('/', '..', a/b)
  pwd                       Print current path
  mkdir <dir>               Create directory
  write <file> <text>       Create a file with the given text
  read <file>               Print file content
  import <host-dir>         Copy a host directory into the current directory
  export <host-dir>         Copy the current directory to an empty host directory
  check [--strict]          Check file system integrity
  boot                      Install the standard boot block
  help                      Show this help message
  exit                      Quit the shell
"
        .bright_black()
    );
}
