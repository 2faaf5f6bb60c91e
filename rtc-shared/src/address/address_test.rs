use super::*;

fn ip(s: &str) -> IpAddr {
    s.parse().unwrap()
}

#[test]
fn test_ip_address_type() {
    let tests = vec![
        ("0.0.0.0", IpAddressType::Any),
        ("::", IpAddressType::Any),
        ("::ffff:0.0.0.0", IpAddressType::Any),
        ("127.0.0.1", IpAddressType::Loopback),
        ("127.255.1.2", IpAddressType::Loopback),
        ("::1", IpAddressType::Loopback),
        ("10.1.2.3", IpAddressType::Private),
        ("172.16.0.1", IpAddressType::Private),
        ("172.31.255.255", IpAddressType::Private),
        ("192.168.1.1", IpAddressType::Private),
        ("169.254.10.10", IpAddressType::Private),
        ("100.64.0.1", IpAddressType::Private),
        ("fe80::1", IpAddressType::Private),
        ("fd00::1", IpAddressType::Private),
        ("172.32.0.1", IpAddressType::Public),
        ("100.128.0.1", IpAddressType::Public),
        ("8.8.8.8", IpAddressType::Public),
        ("2001:db8::1", IpAddressType::Public),
    ];

    for (addr, expected) in tests {
        assert_eq!(ip_address_type(&ip(addr)), expected, "{addr}");
    }
}

#[test]
fn test_ipv6_prefix_predicates() {
    assert!(ip_is_6bone(&ip("3ffe::1")));
    assert!(!ip_is_6bone(&ip("3fff::1")));
    assert!(ip_is_6to4(&ip("2002:c000:0204::1")));
    assert!(ip_is_teredo(&ip("2001:0:4136:e378::1")));
    assert!(!ip_is_teredo(&ip("2001:db8::1")));
    assert!(ip_is_site_local(&ip("fec0::1")));
    assert!(!ip_is_site_local(&ip("fe80::1")));
    assert!(ip_is_ula(&ip("fc00::1")));
    assert!(ip_is_ula(&ip("fdff::1")));
    assert!(ip_is_v4_mapped(&ip("::ffff:1.2.3.4")));
    assert!(!ip_is_v4_mapped(&ip("::1.2.3.4")));
    assert!(ip_is_v4_compatibility(&ip("::1.2.3.4")));
    assert!(ip_is_mac_based(&ip("fe80::0211:22ff:fe33:4455")));
    assert!(!ip_is_mac_based(&ip("fe80::1")));

    // IPv4 addresses never match IPv6-only ranges.
    assert!(!ip_is_ula(&ip("10.0.0.1")));
    assert!(!ip_is_v4_mapped(&ip("1.2.3.4")));
}

#[test]
fn test_ip_address_precedence() {
    let tests = vec![
        ("1.2.3.4", 30),
        ("::1", 60),
        ("fd00::1", 50),
        ("::ffff:1.2.3.4", 30),
        ("2002::1", 20),
        ("2001::1", 10),
        ("fec0::1", 1),
        ("3ffe::1", 1),
        ("::1.2.3.4", 1),
        ("2607:f8b0::1", 40),
    ];

    for (addr, expected) in tests {
        assert_eq!(ip_address_precedence(&ip(addr)), expected, "{addr}");
    }
}

#[test]
fn test_truncate_ip() {
    let tests = vec![
        ("192.168.1.77", 24, "192.168.1.0"),
        ("192.168.1.77", 16, "192.168.0.0"),
        ("192.168.1.77", 0, "0.0.0.0"),
        ("192.168.1.77", 32, "192.168.1.77"),
        ("192.168.1.77", 40, "192.168.1.77"),
        ("2001:db8:1:2:3:4:5:6", 64, "2001:db8:1:2::"),
        ("2001:db8:1:2:3:4:5:6", 24, "2001:d00::"),
        ("2001:db8:1:2:3:4:5:6", 128, "2001:db8:1:2:3:4:5:6"),
    ];

    for (addr, length, expected) in tests {
        assert_eq!(truncate_ip(&ip(addr), length), ip(expected), "{addr}/{length}");
    }
}

#[test]
fn test_count_ip_mask_bits() {
    assert_eq!(count_ip_mask_bits(&ip("255.255.255.0")), 24);
    assert_eq!(count_ip_mask_bits(&ip("255.255.240.0")), 20);
    assert_eq!(count_ip_mask_bits(&ip("0.0.0.0")), 0);
    assert_eq!(count_ip_mask_bits(&ip("255.255.255.255")), 32);
    assert_eq!(count_ip_mask_bits(&ip("ffff:ffff:ffff:ffff::")), 64);
}

#[test]
fn test_normalization() {
    assert_eq!(normalized(&ip("::ffff:10.0.0.1")), ip("10.0.0.1"));
    assert_eq!(normalized(&ip("2001:db8::1")), ip("2001:db8::1"));
    assert_eq!(normalized(&ip("10.0.0.1")), ip("10.0.0.1"));
    assert_eq!(as_ipv6_address(&ip("10.0.0.1")), ip("::ffff:10.0.0.1"));
    assert_eq!(as_ipv6_address(&ip("::1")), ip("::1"));
}

#[test]
fn test_family_helpers() {
    assert_eq!(get_loopback_ip(AddressFamily::V4), ip("127.0.0.1"));
    assert_eq!(get_loopback_ip(AddressFamily::V6), ip("::1"));
    assert_eq!(get_any_ip(AddressFamily::V4), ip("0.0.0.0"));
    assert_eq!(get_any_ip(AddressFamily::V6), ip("::"));
    assert_eq!(ip_overhead(&ip("1.2.3.4")), 20);
    assert_eq!(ip_overhead(&ip("::1")), 40);
    assert_eq!(AddressFamily::of(&ip("::1")), AddressFamily::V6);
}

#[test]
fn test_to_sensitive_string() {
    assert_eq!(to_sensitive_string(&ip("192.168.10.42")), "192.168.10.x");
    assert_eq!(
        to_sensitive_string(&ip("2001:db8:85a3::8a2e:370:7334")),
        "2001:db8:85a3:x:x:x:x:x"
    );
}

#[test]
fn test_is_compatible_address() {
    let tests = vec![
        ("192.168.1.2", "8.8.8.8", true),
        ("192.168.1.2", "2001:db8::1", false),
        ("2001:db8::2", "1.2.3.4", false),
        ("2001:db8::2", "2001:db8::1", true),
        ("fe80::2", "2001:db8::1", false),
        ("fe80::2", "fe80::1", true),
    ];

    for (local, remote, expected) in tests {
        assert_eq!(
            is_compatible_address(&ip(local), &ip(remote)),
            expected,
            "{local} -> {remote}"
        );
    }
}
