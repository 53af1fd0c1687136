use clap::{Parser, Subcommand};
use gosscan::{
   Error, Result,
   cmd::{self, ConnectionArgs, scan::ScanArgs},
};

/// Command-line arguments for the gosscan application
#[derive(Parser)]
#[command(name = "gosscan")]
#[command(about = "Read-only integrity scan of SAP GOS attachments")]
#[command(version)]
struct Cli {
   #[arg(short, long, global = true, help = "Log progress to stderr")]
   verbose: bool,

   #[command(subcommand)]
   command: Cmd,
}

/// Available subcommands for gosscan
#[derive(Subcommand)]
enum Cmd {
   #[command(about = "Find orphaned GOS relationships and write a PDF report")]
   Scan {
      #[command(flatten)]
      conn: ConnectionArgs,

      #[command(flatten)]
      args: ScanArgs,
   },

   #[command(
      name = "validate-connection",
      about = "Check logon, table authorizations and read-only compliance"
   )]
   ValidateConnection {
      #[command(flatten)]
      conn: ConnectionArgs,

      #[arg(long, help = "JSON output")]
      json: bool,
   },
}

#[tokio::main]
async fn main() {
   // Usage errors share exit code 1 with configuration errors; 2 means unreachable.
   let cli = match Cli::try_parse() {
      Ok(cli) => cli,
      Err(err) => {
         let _ = err.print();
         std::process::exit(if err.use_stderr() { 1 } else { 0 });
      },
   };

   let rust_log = std::env::var("RUST_LOG").ok();
   tracing_subscriber::fmt()
      .with_env_filter(cmd::log_filter(cli.verbose, rust_log.as_deref()))
      .with_writer(std::io::stderr)
      .init();

   if let Err(err) = run(cli).await {
      if !matches!(err, Error::Reported { .. }) {
         eprintln!("{err}");
      }
      std::process::exit(err.exit_code());
   }
}

async fn run(cli: Cli) -> Result<()> {
   match cli.command {
      Cmd::Scan { conn, args } => cmd::scan::execute(conn, args).await,
      Cmd::ValidateConnection { conn, json } => cmd::validate_connection::execute(conn, json).await,
   }
}
