#[cfg(test)]
mod tests {

    use std::collections::HashMap;

    use crate::assemble::{
        AsmInsn, AsmOperands, BodyItem, MethodAssembler, MethodBody, RefTarget, RegDirective,
    };
    use crate::error::{DexError, ErrorKind};
    use crate::payload::{FILL_ARRAY_DATA_IDENT, PACKED_SWITCH_IDENT};
    use crate::regs::{p, v, RegisterWindow, SymReg};
    use crate::resolver::{NullResolver, PoolResolver};

    struct StringTableResolver {
        strings: HashMap<String, u32>,
    }

    impl StringTableResolver {
        fn with_string(s: &str, idx: u32) -> Self {
            let mut strings = HashMap::new();
            strings.insert(s.to_string(), idx);
            StringTableResolver { strings }
        }
    }

    impl PoolResolver for StringTableResolver {
        fn string_index(&self, s: &str) -> Result<u32, DexError> {
            self.strings.get(s).copied().ok_or_else(|| {
                ErrorKind::Unresolved { kind: "string", symbol: s.to_string() }.into()
            })
        }

        fn type_index(&self, _descriptor: &str) -> Result<u32, DexError> {
            Ok(0)
        }

        fn field_index(
            &self,
            _class: &str,
            _name: &str,
            _descriptor: &str,
        ) -> Result<u32, DexError> {
            Ok(0)
        }

        fn method_index(&self, _class: &str, _name: &str, _proto: &str) -> Result<u32, DexError> {
            Ok(0)
        }

        fn proto_index(&self, _proto: &str) -> Result<u32, DexError> {
            Ok(0)
        }

        fn call_site_index(&self, _name: &str) -> Result<u32, DexError> {
            Ok(0)
        }

        fn method_handle_index(&self, _name: &str) -> Result<u32, DexError> {
            Ok(0)
        }
    }

    fn insn(opcode: u8, operands: AsmOperands) -> BodyItem {
        BodyItem::Insn(AsmInsn { opcode, operands })
    }

    fn ret_void() -> BodyItem {
        insn(0x0e, AsmOperands::None)
    }

    #[test]
    fn const4_return() {
        let body = MethodBody {
            regs: RegDirective::Registers(1),
            ins_words: 0,
            items: vec![
                insn(0x12, AsmOperands::Lit { regs: vec![v(0)], value: 5 }),
                insn(0x0f, AsmOperands::Regs(vec![v(0)])),
            ],
        };
        let out = MethodAssembler::new(&NullResolver).assemble(&body).unwrap();
        assert_eq!(out.code_units, vec![0x5012, 0x000f]);
        assert_eq!(out.registers_size, 1);
        assert_eq!(out.ins_size, 0);
        assert_eq!(out.outs_size, 0);
        assert!(out.tries.is_empty());
    }

    #[test]
    fn forward_goto() {
        let body = MethodBody {
            regs: RegDirective::Registers(1),
            ins_words: 0,
            items: vec![
                insn(0x28, AsmOperands::Branch { regs: vec![], label: "end".to_string() }),
                insn(0x13, AsmOperands::Lit { regs: vec![v(0)], value: 0 }),
                BodyItem::Label("end".to_string()),
                ret_void(),
            ],
        };
        let out = MethodAssembler::new(&NullResolver).assemble(&body).unwrap();
        // goto is one unit, const/16 two, so :end sits at +3
        assert_eq!(out.code_units, vec![0x0328, 0x0013, 0x0000, 0x000e]);
        assert_eq!(out.label_offsets["end"], 3);
    }

    #[test]
    fn backward_branch() {
        let body = MethodBody {
            regs: RegDirective::Registers(1),
            ins_words: 0,
            items: vec![
                BodyItem::Label("loop".to_string()),
                insn(0x12, AsmOperands::Lit { regs: vec![v(0)], value: 0 }),
                insn(0x38, AsmOperands::Branch { regs: vec![v(0)], label: "loop".to_string() }),
                ret_void(),
            ],
        };
        let out = MethodAssembler::new(&NullResolver).assemble(&body).unwrap();
        // if-eqz sits at 1, :loop at 0
        assert_eq!(out.code_units[1], 0x0038);
        assert_eq!(out.code_units[2], 0xffff);
    }

    #[test]
    fn assembly_is_deterministic() {
        let body = MethodBody {
            regs: RegDirective::Locals(2),
            ins_words: 1,
            items: vec![
                insn(0x28, AsmOperands::Branch { regs: vec![], label: "end".to_string() }),
                BodyItem::Label("mid".to_string()),
                insn(0x12, AsmOperands::Lit { regs: vec![v(1)], value: 3 }),
                BodyItem::Label("end".to_string()),
                ret_void(),
            ],
        };
        let asm = MethodAssembler::new(&NullResolver);
        let a = asm.assemble(&body).unwrap();
        let b = asm.assemble(&body).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn duplicate_and_unknown_labels() {
        let body = MethodBody {
            regs: RegDirective::Registers(0),
            ins_words: 0,
            items: vec![
                BodyItem::Label("a".to_string()),
                BodyItem::Label("a".to_string()),
                ret_void(),
            ],
        };
        let e = MethodAssembler::new(&NullResolver).assemble(&body).unwrap_err();
        assert!(matches!(e.kind(), ErrorKind::DuplicateLabel { .. }));

        let body = MethodBody {
            regs: RegDirective::Registers(0),
            ins_words: 0,
            items: vec![insn(
                0x28,
                AsmOperands::Branch { regs: vec![], label: "nowhere".to_string() },
            )],
        };
        let e = MethodAssembler::new(&NullResolver).assemble(&body).unwrap_err();
        assert!(matches!(e.kind(), ErrorKind::UnknownLabel { opcode: "goto", .. }));
    }

    #[test]
    fn payload_label_clashes_with_code_label() {
        // the same name as a code label and a payload label is a duplicate
        // regardless of which declaration comes first
        let label_first = vec![
            BodyItem::Label("x".to_string()),
            ret_void(),
            BodyItem::ArrayData { label: "x".to_string(), element_width: 1, data: vec![1] },
        ];
        let payload_first = vec![
            BodyItem::ArrayData { label: "x".to_string(), element_width: 1, data: vec![1] },
            BodyItem::Label("x".to_string()),
            ret_void(),
        ];
        for items in [label_first, payload_first] {
            let body = MethodBody { regs: RegDirective::Registers(0), ins_words: 0, items };
            let e = MethodAssembler::new(&NullResolver).assemble(&body).unwrap_err();
            assert!(matches!(e.kind(), ErrorKind::DuplicateLabel { .. }));
        }
    }

    #[test]
    fn array_payload_alignment_and_patching() {
        // five units of instructions force a NOP pad before the payload
        let body = MethodBody {
            regs: RegDirective::Registers(1),
            ins_words: 0,
            items: vec![
                insn(0x26, AsmOperands::PayloadRef { reg: v(0), label: "arr".to_string() }),
                insn(0x12, AsmOperands::Lit { regs: vec![v(0)], value: 0 }),
                ret_void(),
                BodyItem::ArrayData {
                    label: "arr".to_string(),
                    element_width: 1,
                    data: vec![0x11, 0x22],
                },
            ],
        };
        let out = MethodAssembler::new(&NullResolver).assemble(&body).unwrap();
        assert_eq!(out.code_units.len(), 11);
        assert_eq!(out.code_units[5], 0x0000); // pad
        assert_eq!(out.code_units[6], FILL_ARRAY_DATA_IDENT);
        // the 31t delta now points at the payload
        assert_eq!(out.code_units[1], 6);
        assert_eq!(out.code_units[2], 0);
        assert_eq!(out.label_offsets["arr"], 6);
    }

    #[test]
    fn packed_switch_deltas() {
        let body = MethodBody {
            regs: RegDirective::Registers(1),
            ins_words: 0,
            items: vec![
                insn(0x2b, AsmOperands::PayloadRef { reg: v(0), label: "table".to_string() }),
                BodyItem::Label("a".to_string()),
                insn(0x12, AsmOperands::Lit { regs: vec![v(0)], value: 0 }),
                BodyItem::Label("b".to_string()),
                insn(0x12, AsmOperands::Lit { regs: vec![v(0)], value: 1 }),
                BodyItem::Label("c".to_string()),
                ret_void(),
                BodyItem::PackedSwitchData {
                    label: "table".to_string(),
                    first_key: 10,
                    targets: vec!["a".to_string(), "b".to_string(), "c".to_string()],
                },
            ],
        };
        let out = MethodAssembler::new(&NullResolver).assemble(&body).unwrap();
        // instructions occupy six units, so the payload needs no pad
        assert_eq!(out.code_units[1], 6);
        assert_eq!(
            &out.code_units[6..],
            &[PACKED_SWITCH_IDENT, 3, 10, 0, 3, 0, 4, 0, 5, 0]
        );
    }

    #[test]
    fn switch_payload_shared_is_rejected() {
        let body = MethodBody {
            regs: RegDirective::Registers(1),
            ins_words: 0,
            items: vec![
                insn(0x2b, AsmOperands::PayloadRef { reg: v(0), label: "table".to_string() }),
                insn(0x2b, AsmOperands::PayloadRef { reg: v(0), label: "table".to_string() }),
                BodyItem::Label("a".to_string()),
                ret_void(),
                BodyItem::PackedSwitchData {
                    label: "table".to_string(),
                    first_key: 0,
                    targets: vec!["a".to_string()],
                },
            ],
        };
        let e = MethodAssembler::new(&NullResolver).assemble(&body).unwrap_err();
        assert!(matches!(e.kind(), ErrorKind::PayloadMultiplyReferenced { .. }));
    }

    #[test]
    fn array_payload_may_be_shared() {
        let body = MethodBody {
            regs: RegDirective::Registers(1),
            ins_words: 0,
            items: vec![
                insn(0x26, AsmOperands::PayloadRef { reg: v(0), label: "arr".to_string() }),
                insn(0x26, AsmOperands::PayloadRef { reg: v(0), label: "arr".to_string() }),
                ret_void(),
                BodyItem::ArrayData {
                    label: "arr".to_string(),
                    element_width: 2,
                    data: vec![1, 0, 2, 0],
                },
            ],
        };
        let out = MethodAssembler::new(&NullResolver).assemble(&body).unwrap();
        // both references point at the payload: 8 - 0 and 8 - 3
        assert_eq!(out.code_units[1], 8);
        assert_eq!(out.code_units[4], 5);
    }

    #[test]
    fn unreferenced_payload_is_dropped() {
        let body = MethodBody {
            regs: RegDirective::Registers(0),
            ins_words: 0,
            items: vec![
                ret_void(),
                BodyItem::ArrayData {
                    label: "arr".to_string(),
                    element_width: 1,
                    data: vec![1],
                },
            ],
        };
        let out = MethodAssembler::new(&NullResolver).assemble(&body).unwrap();
        assert_eq!(out.code_units, vec![0x000e]);
    }

    #[test]
    fn reference_to_undeclared_payload() {
        let body = MethodBody {
            regs: RegDirective::Registers(1),
            ins_words: 0,
            items: vec![insn(
                0x26,
                AsmOperands::PayloadRef { reg: v(0), label: "arr".to_string() },
            )],
        };
        let e = MethodAssembler::new(&NullResolver).assemble(&body).unwrap_err();
        assert!(matches!(e.kind(), ErrorKind::UnknownLabel { opcode: "fill-array-data", .. }));
    }

    #[test]
    fn unsorted_sparse_switch_rejected() {
        let body = MethodBody {
            regs: RegDirective::Registers(1),
            ins_words: 0,
            items: vec![
                insn(0x2c, AsmOperands::PayloadRef { reg: v(0), label: "table".to_string() }),
                BodyItem::Label("a".to_string()),
                ret_void(),
                BodyItem::SparseSwitchData {
                    label: "table".to_string(),
                    entries: vec![(5, "a".to_string()), (2, "a".to_string())],
                },
            ],
        };
        let e = MethodAssembler::new(&NullResolver).assemble(&body).unwrap_err();
        assert!(matches!(e.kind(), ErrorKind::UnsortedSwitchKeys { .. }));
    }

    #[test]
    fn string_reference_resolution() {
        let items = vec![
            insn(
                0x1a,
                AsmOperands::Ref { regs: vec![v(0)], target: RefTarget::Str("hi".to_string()) },
            ),
            ret_void(),
        ];
        let body = MethodBody { regs: RegDirective::Registers(1), ins_words: 0, items };

        let resolver = StringTableResolver::with_string("hi", 7);
        let out = MethodAssembler::new(&resolver).assemble(&body).unwrap();
        assert_eq!(out.code_units, vec![0x001a, 0x0007, 0x000e]);

        let resolver = StringTableResolver::with_string("other", 7);
        let e = MethodAssembler::new(&resolver).assemble(&body).unwrap_err();
        assert!(matches!(e.kind(), ErrorKind::Unresolved { kind: "string", .. }));
    }

    #[test]
    fn reference_kind_mismatch() {
        // const-string with a type reference
        let body = MethodBody {
            regs: RegDirective::Registers(1),
            ins_words: 0,
            items: vec![insn(
                0x1a,
                AsmOperands::Ref {
                    regs: vec![v(0)],
                    target: RefTarget::Type("Ljava/lang/String;".to_string()),
                },
            )],
        };
        let e = MethodAssembler::new(&NullResolver).assemble(&body).unwrap_err();
        assert!(matches!(e.kind(), ErrorKind::OperandMismatch { opcode: "const-string", .. }));
    }

    #[test]
    fn try_catch_table() {
        let body = MethodBody {
            regs: RegDirective::Registers(1),
            ins_words: 0,
            items: vec![
                BodyItem::Label("try_start".to_string()),
                insn(0x12, AsmOperands::Lit { regs: vec![v(0)], value: 0 }),
                insn(0x12, AsmOperands::Lit { regs: vec![v(0)], value: 1 }),
                BodyItem::Label("try_end".to_string()),
                BodyItem::Label("handler".to_string()),
                ret_void(),
                BodyItem::Catch {
                    start: "try_start".to_string(),
                    end: "try_end".to_string(),
                    exception: None,
                    handler: "handler".to_string(),
                },
                BodyItem::Catch {
                    start: "try_start".to_string(),
                    end: "try_end".to_string(),
                    exception: Some("Ljava/lang/Exception;".to_string()),
                    handler: "handler".to_string(),
                },
            ],
        };
        let out = MethodAssembler::new(&NullResolver).assemble(&body).unwrap();
        assert_eq!(out.tries.len(), 1);
        let t = &out.tries[0];
        assert_eq!(t.start_addr, 0);
        assert_eq!(t.insn_count, 2);
        // typed handler first, the catch-all last
        assert_eq!(t.handlers.len(), 2);
        assert_eq!(t.handlers[0].type_index, Some(0));
        assert_eq!(t.handlers[1].type_index, None);
        assert_eq!(t.handlers[1].addr, 2);
    }

    #[test]
    fn empty_try_range_rejected() {
        let body = MethodBody {
            regs: RegDirective::Registers(0),
            ins_words: 0,
            items: vec![
                BodyItem::Label("a".to_string()),
                ret_void(),
                BodyItem::Catch {
                    start: "a".to_string(),
                    end: "a".to_string(),
                    exception: None,
                    handler: "a".to_string(),
                },
            ],
        };
        let e = MethodAssembler::new(&NullResolver).assemble(&body).unwrap_err();
        assert!(matches!(e.kind(), ErrorKind::BadTryRange { .. }));
    }

    #[test]
    fn two_catch_alls_rejected() {
        let catch_all = BodyItem::Catch {
            start: "s".to_string(),
            end: "e".to_string(),
            exception: None,
            handler: "e".to_string(),
        };
        let body = MethodBody {
            regs: RegDirective::Registers(0),
            ins_words: 0,
            items: vec![
                BodyItem::Label("s".to_string()),
                ret_void(),
                BodyItem::Label("e".to_string()),
                ret_void(),
                catch_all.clone(),
                catch_all,
            ],
        };
        let e = MethodAssembler::new(&NullResolver).assemble(&body).unwrap_err();
        assert!(matches!(e.kind(), ErrorKind::BadTryRange { .. }));
    }

    #[test]
    fn outs_size_covers_all_invoke_forms() {
        let body = MethodBody {
            regs: RegDirective::Registers(4),
            ins_words: 1,
            items: vec![
                insn(
                    0x6e,
                    AsmOperands::Ref {
                        regs: vec![p(0)],
                        target: RefTarget::Method {
                            class: "Ljava/lang/Object;".to_string(),
                            name: "hashCode".to_string(),
                            proto: "()I".to_string(),
                        },
                    },
                ),
                insn(
                    0x77,
                    AsmOperands::Range {
                        first: v(0),
                        count: 3,
                        target: RefTarget::Method {
                            class: "La;".to_string(),
                            name: "b".to_string(),
                            proto: "(IJ)V".to_string(),
                        },
                    },
                ),
                ret_void(),
            ],
        };
        let out = MethodAssembler::new(&NullResolver).assemble(&body).unwrap();
        assert_eq!(out.outs_size, 3);
    }

    #[test]
    fn param_registers_map_after_locals() {
        let w = RegisterWindow::from_registers(3, 1).unwrap();
        assert_eq!(w.locals(), 2);
        assert_eq!(w.resolve(v(0)).unwrap(), 0);
        assert_eq!(w.resolve(p(0)).unwrap(), 2);
        assert!(matches!(
            w.resolve(p(1)).unwrap_err().kind(),
            ErrorKind::RegisterOutOfRange { register: 1, limit: 1, .. }
        ));
        assert!(matches!(
            w.resolve(SymReg::Local(3)).unwrap_err().kind(),
            ErrorKind::RegisterOutOfRange { register: 3, limit: 3, .. }
        ));
    }

    #[test]
    fn bad_register_window() {
        let e = RegisterWindow::from_registers(1, 2).unwrap_err();
        assert!(matches!(e.kind(), ErrorKind::BadRegisterWindow { registers: 1, ins: 2 }));
        let w = RegisterWindow::from_locals(2, 1).unwrap();
        assert_eq!(w.registers_size(), 3);
    }

    #[test]
    fn param_register_in_body() {
        // .registers 3 with one argument word: p0 is v2
        let body = MethodBody {
            regs: RegDirective::Registers(3),
            ins_words: 1,
            items: vec![insn(0x0f, AsmOperands::Regs(vec![p(0)]))],
        };
        let out = MethodAssembler::new(&NullResolver).assemble(&body).unwrap();
        assert_eq!(out.code_units, vec![0x020f]);
    }
}
