#[cfg(test)]
mod tests {

    use crate::error::ErrorKind;
    use crate::payload::{payload_at, Payload, FILL_ARRAY_DATA_IDENT, PACKED_SWITCH_IDENT};

    #[test]
    fn packed_switch_roundtrip() {
        let p = Payload::PackedSwitch { first_key: 10, targets: vec![3, 4, -5] };
        assert_eq!(p.units(), 10);
        let units = p.encode().unwrap();
        assert_eq!(units[0], PACKED_SWITCH_IDENT);
        assert_eq!(units[1], 3);
        assert_eq!(&units[2..4], &[10, 0]);
        assert_eq!(&units[4..6], &[3, 0]);
        assert_eq!(&units[8..10], &[0xfffb, 0xffff]);
        let (back, len) = payload_at(&units, 0).unwrap();
        assert_eq!(len, units.len());
        assert_eq!(back, p);
    }

    #[test]
    fn sparse_switch_roundtrip() {
        let p = Payload::SparseSwitch { keys: vec![-10, 0, 700], targets: vec![8, 16, 24] };
        assert_eq!(p.units(), 14);
        let units = p.encode().unwrap();
        let (back, len) = payload_at(&units, 0).unwrap();
        assert_eq!(len, 14);
        assert_eq!(back, p);
    }

    #[test]
    fn sparse_switch_unsorted_keys_rejected() {
        let p = Payload::SparseSwitch { keys: vec![5, 2], targets: vec![8, 16] };
        let e = p.encode().unwrap_err();
        assert!(matches!(e.kind(), ErrorKind::UnsortedSwitchKeys { position: 1 }));
        // equal keys are unsorted too
        let p = Payload::SparseSwitch { keys: vec![2, 2], targets: vec![8, 16] };
        assert!(p.encode().is_err());
    }

    #[test]
    fn sparse_switch_arity_mismatch() {
        let p = Payload::SparseSwitch { keys: vec![1, 2], targets: vec![8] };
        let e = p.encode().unwrap_err();
        assert!(matches!(e.kind(), ErrorKind::BadPayload { .. }));
    }

    #[test]
    fn array_data_odd_byte_count() {
        let p = Payload::FillArrayData { element_width: 1, data: vec![0x11, 0x22, 0x33] };
        // 3 bytes pack into two units, high byte of the last one unused
        assert_eq!(p.units(), 6);
        let units = p.encode().unwrap();
        assert_eq!(units, vec![FILL_ARRAY_DATA_IDENT, 1, 3, 0, 0x2211, 0x0033]);
        let (back, len) = payload_at(&units, 0).unwrap();
        assert_eq!(len, 6);
        assert_eq!(back, p);
    }

    #[test]
    fn array_data_wide_elements() {
        let p = Payload::FillArrayData {
            element_width: 8,
            data: vec![1, 2, 3, 4, 5, 6, 7, 8],
        };
        assert_eq!(p.units(), 8);
        let units = p.encode().unwrap();
        let (back, _) = payload_at(&units, 0).unwrap();
        assert_eq!(back, p);
    }

    #[test]
    fn array_data_bad_width() {
        let p = Payload::FillArrayData { element_width: 3, data: vec![1, 2, 3] };
        assert!(matches!(p.encode().unwrap_err().kind(), ErrorKind::BadPayload { .. }));
        let p = Payload::FillArrayData { element_width: 4, data: vec![1, 2, 3] };
        assert!(matches!(p.encode().unwrap_err().kind(), ErrorKind::BadPayload { .. }));
    }

    #[test]
    fn unknown_ident() {
        let e = payload_at(&[0x0400, 0x0000], 0).unwrap_err();
        assert!(matches!(e.kind(), ErrorKind::UnknownIdent { ident: 0x0400, offset: 0 }));
    }

    #[test]
    fn truncated_payload() {
        // claims three targets but carries one
        let units = vec![PACKED_SWITCH_IDENT, 3, 10, 0, 3, 0];
        let e = payload_at(&units, 0).unwrap_err();
        assert!(matches!(e.kind(), ErrorKind::TruncatedStream { need: 10, have: 6, .. }));
    }
}
