use std::fmt;

/// An ICE candidate as carried by `a=candidate`.
#[derive(Default, Debug, Clone, PartialEq, Eq, Hash)]
pub struct CandidateInfo {
    pub foundation: String,
    pub component_id: u16,
    pub transport: String,
    pub priority: u32,
    pub address: String,
    pub port: u16,
    pub typ: String,
    pub rel_addr: Option<String>,
    pub rel_port: Option<u16>,
}

impl CandidateInfo {
    pub fn new(
        foundation: &str,
        component_id: u16,
        transport: &str,
        priority: u32,
        address: &str,
        port: u16,
        typ: &str,
    ) -> Self {
        CandidateInfo {
            foundation: foundation.to_owned(),
            component_id,
            transport: transport.to_owned(),
            priority,
            address: address.to_owned(),
            port,
            typ: typ.to_owned(),
            rel_addr: None,
            rel_port: None,
        }
    }

    pub fn with_related(mut self, rel_addr: &str, rel_port: u16) -> Self {
        self.rel_addr = Some(rel_addr.to_owned());
        self.rel_port = Some(rel_port);
        self
    }

    /// Address and port the media engine should send connectivity checks to.
    ///
    /// Relay candidates are reached through their related address.
    pub fn target(&self) -> (&str, u16) {
        match (self.typ.as_str(), &self.rel_addr, self.rel_port) {
            ("relay", Some(addr), Some(port)) => (addr.as_str(), port),
            _ => (self.address.as_str(), self.port),
        }
    }
}

impl fmt::Display for CandidateInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} {} {} {} typ {}",
            self.foundation,
            self.component_id,
            self.transport,
            self.priority,
            self.address,
            self.port,
            self.typ
        )?;
        if let (Some(addr), Some(port)) = (&self.rel_addr, self.rel_port) {
            write!(f, " raddr {addr} rport {port}")?;
        }
        Ok(())
    }
}
