pub mod command;
pub mod parse;

use crate::shell::{
    command::{execute_command, Command, Session},
    parse::parse_command,
};
use amiga_fs::{
    disk::types::{DiskDensity, DiskDiameter},
    fs::{Device, FileSystemError, VolumeType},
};
use colored::*;
use crossterm::{
    cursor, execute,
    style::{Color, Print, ResetColor, SetForegroundColor},
    terminal::{Clear, ClearType},
};
use indicatif::{ProgressBar, ProgressStyle};
use reedline::{DefaultCompleter, DefaultPrompt, DefaultPromptSegment, FileBackedHistory, Reedline, Signal};
use std::{
    error::Error,
    io::stdout,
    path::PathBuf,
    sync::mpsc::{self, Sender},
    thread,
    time::Duration,
};

/// 启动线程向界面汇报的进度
pub enum BootProgress {
    Step(&'static str),
    Progress(u64),
    Finished(Result<Device, FileSystemError>),
}

/// 在后台格式化一张空白 DD 软盘
fn perform_disk_initialization(tx: Sender<BootProgress>) {
    let _ = tx.send(BootProgress::Step("🧠 Initializing virtual floppy..."));
    let _ = tx.send(BootProgress::Progress(30));

    let _ = tx.send(BootProgress::Step("⚙️  Formatting OFS volume..."));
    let result = Device::make_with_floppy(DiskDiameter::Inch35, DiskDensity::Dd, VolumeType::Ofs);
    let _ = tx.send(BootProgress::Progress(90));

    let _ = tx.send(BootProgress::Finished(result));
}

pub fn start_shell() -> Result<(), Box<dyn Error>> {
    let device = boot_animation()?;
    let mut session = Session::new(device);

    let username = whoami::username();
    let hostname = whoami::fallible::hostname().unwrap_or_else(|_| "amiga".to_string());

    println!(
        "{}",
        "Type 'help' for available commands. Use ↑↓ for history, Tab for auto-completion.\n"
            .bright_black()
    );

    // 初始化 reedline
    let history_path = dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".amigafs_history");

    let mut line_editor = Reedline::create();
    match FileBackedHistory::with_file(100, history_path) {
        Ok(history) => line_editor = line_editor.with_history(Box::new(history)),
        Err(e) => tracing::warn!(error = %e, "command history is disabled"),
    }

    // 命令补全
    let commands = vec![
        "help", "format", "open", "save", "info", "ls", "cd", "pwd", "mkdir", "write", "read",
        "import", "export", "check", "boot", "exit",
    ]
    .into_iter()
    .map(String::from)
    .collect();
    let completer = DefaultCompleter::new_with_wordlen(commands, 2);
    line_editor = line_editor.with_completer(Box::new(completer));

    let prompt = DefaultPrompt::new(
        DefaultPromptSegment::Basic(format!(
            "{}@{}",
            username.green().bold(),
            hostname.cyan().bold()
        )),
        DefaultPromptSegment::Basic("AmigaFS".bright_blue().bold().to_string()),
    );

    loop {
        let full_prompt = format!(
            "{}:{}> ",
            format!("{}@{}", username, hostname).green(),
            session.pwd().blue()
        );

        let mut current_prompt = prompt.clone();
        current_prompt.left_prompt = DefaultPromptSegment::Basic(full_prompt);
        let input = line_editor.read_line(&current_prompt);

        match input {
            Ok(Signal::Success(buffer)) => {
                let trimmed = buffer.trim();
                if trimmed.is_empty() {
                    continue;
                }

                match parse_command(trimmed) {
                    Some(cmd) => {
                        if let Err(e) = execute_command(&cmd, &mut session) {
                            println!("{} {}", "❌ Error:".red().bold(), e);
                        }
                        if matches!(cmd, Command::Exit) {
                            break;
                        }
                    }
                    None => println!(
                        "{}",
                        "⚠️  Unknown command. Type 'help' for command list.".yellow()
                    ),
                }
            }
            Ok(Signal::CtrlC) => {
                println!();
                continue;
            }
            Ok(Signal::CtrlD) => {
                println!("{}", "Exiting Amiga FS...".yellow());
                break;
            }
            Err(e) => {
                println!("Error reading line: {}", e);
                break;
            }
        }
    }

    println!("{}", "GoodBye!".bright_yellow());
    Ok(())
}

/// 启动动画，同时在后台准备好第一张软盘
fn boot_animation() -> Result<Device, Box<dyn Error>> {
    let mut stdout = stdout();

    execute!(stdout, Clear(ClearType::All), cursor::MoveTo(0, 0))?;
    println!("{}", "[Amiga FS Booting...]".bright_yellow().bold());

    let pb = ProgressBar::new(100);
    pb.set_style(
        ProgressStyle::with_template("[{bar:40.cyan/blue}] {pos:>3}% {msg}")?.progress_chars("=> "),
    );

    let (tx, rx) = mpsc::channel();
    let worker = thread::spawn(move || perform_disk_initialization(tx));

    let mut device = None;
    for msg in rx {
        match msg {
            BootProgress::Step(step) => pb.println(step),
            BootProgress::Progress(pos) => pb.set_position(pos),
            BootProgress::Finished(result) => {
                pb.set_position(100);
                device = Some(result?);
            }
        }
        thread::sleep(Duration::from_millis(150));
    }
    let _ = worker.join();
    pb.finish_with_message("✅ Ready!");

    let device = device.ok_or("disk initialization did not finish")?;

    thread::sleep(Duration::from_millis(300));
    execute!(
        stdout,
        Clear(ClearType::All),
        cursor::MoveTo(0, 0),
        SetForegroundColor(Color::Cyan),
        Print(format!("Welcome to Amiga FS v{}\n", env!("CARGO_PKG_VERSION"))),
        ResetColor
    )?;
    Ok(device)
}
