use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;

use crate::error::Error;

/// Inclusive IPv4 address range written `10.0.0.1-10.0.0.9`,
/// the format cluster vserver ranges are reported in.
#[derive(Hash, Eq, PartialEq, Debug, Clone, Copy)]
pub struct Ipv4Range {
    pub start: Ipv4Addr,
    pub end: Ipv4Addr,
}

impl Ipv4Range {
    pub fn len(&self) -> u64 {
        u64::from(u32::from(self.end)) - u64::from(u32::from(self.start)) + 1
    }

    pub fn addresses(&self) -> impl Iterator<Item = Ipv4Addr> {
        (u32::from(self.start)..=u32::from(self.end)).map(Ipv4Addr::from)
    }
}

impl FromStr for Ipv4Range {
    type Err = Error;

    fn from_str(range: &str) -> Result<Self, Self::Err> {
        let invalid = || Error::InvalidIpRange(range.to_string());

        let elems: Vec<&str> = range.trim().split('-').collect();
        if elems.len() != 2 {
            return Err(invalid());
        }
        let start: Ipv4Addr = elems[0].trim().parse().map_err(|_| invalid())?;
        let end: Ipv4Addr = elems[1].trim().parse().map_err(|_| invalid())?;
        if u32::from(start) > u32::from(end) {
            return Err(invalid());
        }
        Ok(Self { start, end })
    }
}

impl fmt::Display for Ipv4Range {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}-{}", self.start, self.end)
    }
}
