use super::*;
use crate::xoraddr::XorMappedAddress;

#[test]
fn test_mapped_address() -> Result<()> {
    let tests = vec!["122.12.34.5:5412", "[2001:db8::68]:3478"];

    for addr in tests {
        let addr: SocketAddr = addr.parse().unwrap();
        let mut m = Message::new();
        m.build(&[&BINDING_SUCCESS, &MappedAddress::from(addr)])?;

        let mut decoded = Message::new();
        decoded.unmarshal_binary(&m.raw)?;
        let mut got = MappedAddress::default();
        got.get_from(&decoded)?;
        assert_eq!(got.socket_addr(), addr);
        assert_eq!(got.to_string(), addr.to_string());
    }

    Ok(())
}

#[test]
fn test_mapped_address_errors() {
    let tests = vec![
        ("missing", None, Error::ErrAttributeNotFound),
        ("too short", Some(vec![0, 1, 0, 80]), Error::ErrUnexpectedEof),
        (
            "bad family",
            Some(vec![0, 3, 0, 80, 1, 2, 3, 4]),
            Error::ErrUnsupportedFamily(3),
        ),
        (
            "bad v4 length",
            Some(vec![0, 1, 0, 80, 1, 2, 3, 4, 5]),
            Error::ErrBadIpLength,
        ),
        (
            "bad v6 length",
            Some(vec![0, 2, 0, 80, 1, 2, 3, 4]),
            Error::ErrBadIpLength,
        ),
    ];

    for (name, value, expected) in tests {
        let mut m = Message::new();
        m.write_header();
        if let Some(value) = value {
            m.add(ATTR_MAPPED_ADDRESS, &value);
        }
        let mut got = MappedAddress::default();
        assert_eq!(got.get_from(&m), Err(expected), "{name}");
    }
}

#[test]
fn test_mapped_address_prefers_xor() -> Result<()> {
    let plain: SocketAddr = "10.0.0.1:1000".parse().unwrap();
    let xored: SocketAddr = "203.0.113.9:2000".parse().unwrap();

    let mut m = Message::new();
    m.build(&[
        &TransactionId::new(),
        &BINDING_SUCCESS,
        &MappedAddress::from(plain),
        &XorMappedAddress::from(xored),
    ])?;
    assert_eq!(mapped_address(&m)?, xored);

    let mut m = Message::new();
    m.build(&[&TransactionId::new(), &BINDING_SUCCESS, &MappedAddress::from(plain)])?;
    assert_eq!(mapped_address(&m)?, plain);

    let mut m = Message::new();
    m.build(&[&TransactionId::new(), &BINDING_SUCCESS])?;
    assert_eq!(mapped_address(&m), Err(Error::ErrAttributeNotFound));

    Ok(())
}
