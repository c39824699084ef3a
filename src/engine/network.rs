//! Static IP planning for master nodes.

use std::net::Ipv4Addr;

use crate::error::GeneratorError;

/// Offset of the internal load balancer address from the first master IP.
pub const INTERNAL_LB_STATIC_IP_OFFSET: u8 = 10;

fn parse_ipv4(addr: &str) -> Result<Ipv4Addr, GeneratorError> {
    addr.trim()
        .parse::<Ipv4Addr>()
        .map_err(|_| GeneratorError::InvalidIpAddress(addr.to_string()))
}

/// `count` consecutive addresses starting at `first_addr`. The fourth octet
/// never wraps: a range reaching 255 is rejected.
pub fn generate_consecutive_ips(count: usize, first_addr: &str) -> Result<Vec<String>, GeneratorError> {
    let ip = parse_ipv4(first_addr)?;
    let [a, b, c, d] = ip.octets();
    if usize::from(d) + count >= 255 {
        return Err(GeneratorError::IpOverflow {
            address: first_addr.to_string(),
            count,
        });
    }
    // the bound above keeps every octet below 255
    Ok((0..count)
        .map(|i| Ipv4Addr::new(a, b, c, d + i as u8).to_string())
        .collect())
}

/// Address of the master internal load balancer: first master IP + 10.
pub fn internal_lb_ip(first_master_ip: &str) -> Result<String, GeneratorError> {
    let [a, b, c, d] = parse_ipv4(first_master_ip)?.octets();
    let last = d
        .checked_add(INTERNAL_LB_STATIC_IP_OFFSET)
        .ok_or_else(|| GeneratorError::IpOverflow {
            address: first_master_ip.to_string(),
            count: usize::from(INTERNAL_LB_STATIC_IP_OFFSET),
        })?;
    Ok(Ipv4Addr::new(a, b, c, last).to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_consecutive_ips() {
        let ips = generate_consecutive_ips(3, "10.240.255.5").unwrap();
        assert_eq!(ips, vec!["10.240.255.5", "10.240.255.6", "10.240.255.7"]);
        assert!(generate_consecutive_ips(0, "10.0.0.1").unwrap().is_empty());
    }

    #[test]
    fn test_invalid_address_rejected() {
        let err = generate_consecutive_ips(1, "10.240.255").unwrap_err();
        assert!(matches!(err, GeneratorError::InvalidIpAddress(addr) if addr == "10.240.255"));
        assert!(generate_consecutive_ips(1, "fe80::1").is_err());
    }

    #[test]
    fn test_fourth_octet_overflow() {
        assert!(generate_consecutive_ips(5, "10.0.0.249").is_ok());
        let err = generate_consecutive_ips(6, "10.0.0.249").unwrap_err();
        assert!(matches!(err, GeneratorError::IpOverflow { count: 6, .. }));
    }

    #[test]
    fn test_internal_lb_ip() {
        assert_eq!(internal_lb_ip("10.255.255.5").unwrap(), "10.255.255.15");
        assert!(internal_lb_ip("10.255.255.250").is_err());
    }
}
