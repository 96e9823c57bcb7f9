use crate::shell::start_shell;
use tracing_subscriber::EnvFilter;

mod shell;

fn main() {
    // 日志级别由 AMIGAFS_LOG 控制，默认只输出警告
    let filter = EnvFilter::try_from_env("AMIGAFS_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = start_shell() {
        eprintln!("amiga-fs: {e}");
        std::process::exit(1);
    }
}
