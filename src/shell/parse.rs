use amiga_fs::{disk::types::DiskDensity, fs::VolumeType};

use crate::shell::command::Command;

pub fn parse_command(input: &str) -> Option<Command> {
    let tokens: Vec<&str> = input.trim().split_ascii_whitespace().collect();
    if tokens.is_empty() {
        return None;
    }

    let cmd = tokens[0];
    let args = &tokens[1..];
    let arg = |i: usize| args.get(i).map(|s| s.to_string());

    match cmd {
        "help" => Some(Command::Help),
        "format" => {
            let mut density = DiskDensity::Dd;
            let mut dos = VolumeType::Ofs;
            for &a in args {
                match a.to_ascii_lowercase().as_str() {
                    "dd" => density = DiskDensity::Dd,
                    "hd" => density = DiskDensity::Hd,
                    "ofs" => dos = VolumeType::Ofs,
                    "ffs" => dos = VolumeType::Ffs,
                    _ => return None,
                }
            }
            Some(Command::Format(density, dos))
        }
        "open" => arg(0).map(Command::Open),
        "save" => arg(0).map(Command::Save),
        "info" => Some(Command::Info),
        "ls" => match args {
            [] => Some(Command::Ls { recursive: false }),
            ["-r"] => Some(Command::Ls { recursive: true }),
            _ => None,
        },
        "cd" => Some(Command::Cd(arg(0).unwrap_or_else(|| "/".to_string()))),
        "pwd" => Some(Command::Pwd),
        "mkdir" => arg(0).map(Command::Mkdir),
        "write" => {
            if args.len() >= 2 {
                Some(Command::Write(args[0].to_string(), args[1..].join(" ")))
            } else {
                None
            }
        }
        "read" => arg(0).map(Command::Read),
        "import" => arg(0).map(Command::Import),
        "export" => arg(0).map(Command::Export),
        "check" => match args {
            [] => Some(Command::Check { strict: false }),
            ["--strict"] => Some(Command::Check { strict: true }),
            _ => None,
        },
        "boot" => Some(Command::Boot),
        "exit" | "quit" => Some(Command::Exit),
        _ => None,
    }
}
