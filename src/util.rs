use std::net::{Ipv4Addr, SocketAddr};

const HUB_ADDR: &str = "HUB_ADDR";

const DEFAULT_ADDR: Ipv4Addr = Ipv4Addr::new(0, 0, 0, 0);

pub fn get_addr() -> Ipv4Addr {
    let addr_from_env = std::env::var(HUB_ADDR);
    addr_from_env.map_or(DEFAULT_ADDR, |res| res.parse().unwrap_or(DEFAULT_ADDR))
}

const HUB_PORT: &str = "HUB_PORT";

const DEFAULT_PORT: u16 = 5000;

pub fn get_default_port() -> u16 {
    DEFAULT_PORT
}

pub fn get_port() -> u16 {
    let port_from_env = std::env::var(HUB_PORT);
    port_from_env.map_or(DEFAULT_PORT, |res| res.parse().unwrap_or(DEFAULT_PORT))
}

pub fn get_listen_addr() -> SocketAddr {
    SocketAddr::from((get_addr(), get_port()))
}
