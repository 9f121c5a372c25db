use clap::Parser;
use std::net::IpAddr;

/// Runtime configuration, sourced from flags or environment variables.
#[derive(Parser, Debug, Clone)]
#[command(name = "confab-server")]
#[command(about = "SFU signaling server for small video rooms", long_about = None)]
pub struct ServerConfig {
    /// HTTP listen port for the signaling endpoint
    #[arg(long, env = "HTTP_PORT", default_value_t = 5000)]
    pub http_port: u16,

    /// Bind address for the HTTP and RTC sockets
    #[arg(long, env = "BIND_ADDR", default_value = "0.0.0.0")]
    pub bind_addr: IpAddr,

    /// Public IP announced in ICE candidates; the bind address is advertised
    /// when absent
    #[arg(long, env = "ANNOUNCED_IP")]
    pub announced_ip: Option<IpAddr>,

    /// Lower bound of the RTC media port range (10000, with 10100 as the
    /// upper bound, is a workable alternative behind strict firewalls)
    #[arg(long, env = "RTC_MIN_PORT", default_value_t = 40000)]
    pub rtc_min_port: u16,

    /// Upper bound of the RTC media port range
    #[arg(long, env = "RTC_MAX_PORT", default_value_t = 49999)]
    pub rtc_max_port: u16,
}
