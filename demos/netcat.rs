//! Pipe stdin to the radio and received data to stdout.
//!
//! Without a destination every line is broadcast and everything received is
//! printed. With one, only that radio is talked to.
//!
//! ```text
//! cargo run --example netcat -- tcp://127.0.0.1:9750 0013A20041AEB54E
//! ```

use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use xbee_session::transport::DeviceSpec;
use xbee_session::{Conn, Session};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing::subscriber::set_global_default(
        tracing_subscriber::FmtSubscriber::builder()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_writer(std::io::stderr)
            .finish(),
    )?;

    let mut args = std::env::args().skip(1);
    let device = args.next().ok_or("usage: netcat <device> [destination]")?;
    let destination = args
        .next()
        .map(|d| u64::from_str_radix(&d, 16))
        .transpose()?;

    let transport = DeviceSpec::parse(&device)?.open().await?;
    let session = Arc::new(Session::open(transport));
    let conn = destination.map(|d| session.dial(d)).transpose()?.map(Arc::new);

    let printer = tokio::spawn(print_received(session.clone(), conn.clone()));

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let mut payload = line.into_bytes();
        payload.push(b'\n');

        let sent = match &conn {
            Some(conn) => conn.write(&payload).await,
            None => session.write(&payload).await,
        };
        if let Err(e) = sent {
            eprintln!("send failed: {e}");
        }
    }

    session.close().await?;
    printer.await??;
    Ok(())
}

async fn print_received(
    session: Arc<Session>,
    conn: Option<Arc<Conn>>,
) -> xbee_session::error::Result<()> {
    let mut stdout = tokio::io::stdout();
    let mut buf = vec![0u8; 1024];
    loop {
        let n = match &conn {
            Some(conn) => conn.read(&mut buf).await?,
            None => session.read(&mut buf).await?,
        };
        if n == 0 {
            return Ok(());
        }
        stdout.write_all(&buf[..n]).await?;
        stdout.flush().await?;
    }
}
