//! Print the identity of a radio.
//!
//! ```text
//! cargo run --example info -- tcp://127.0.0.1:9750
//! cargo run --example info --features serial -- /dev/ttyUSB0:115200
//! ```

use xbee_session::transport::DeviceSpec;
use xbee_session::Session;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing::subscriber::set_global_default(
        tracing_subscriber::FmtSubscriber::builder()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .finish(),
    )?;

    let device = std::env::args()
        .nth(1)
        .ok_or("usage: info <device>")?;
    let transport = DeviceSpec::parse(&device)?.open().await?;
    let session = Session::open(transport);

    let address = session.local_address().await?;
    let pan_id = session.at_command("ID", None, false).await?;
    let name = session.at_command("NI", None, false).await?;

    println!("address: {address:016X}");
    println!("PAN ID:  {}", hex(&pan_id));
    println!("name:    {}", String::from_utf8_lossy(&name));

    session.close().await?;
    Ok(())
}

fn hex(data: &[u8]) -> String {
    data.iter().map(|b| format!("{b:02X}")).collect()
}
