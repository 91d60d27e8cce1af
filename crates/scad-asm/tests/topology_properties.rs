//! Property tests for address resolution and label fixups

use proptest::prelude::*;
use scad_asm::{assemble, resolve, AssemblerError, ProcessorDescription};
use scad_chip::{Direction, Instruction, ScadValue, UnitType};
use std::collections::HashSet;

/// Topology with one unit per listed type, numbered in order
fn topology_of(types: &[UnitType]) -> ProcessorDescription {
    let mut text = format!(
        "[processor]\nname = \"prop\"\nbuffer_depth = 3\n\n\
         [[interconnect]]\nname = \"ic\"\nunit_count = {}\n",
        types.len().max(1)
    );
    for (i, t) in types.iter().enumerate() {
        text.push_str(&format!(
            "\n[[unit]]\nname = \"u{i}\"\ntype = \"{}\"\nnumber = {i}\n",
            t.config_name()
        ));
    }
    ProcessorDescription::parse(&text).expect("generated topology")
}

fn unit_types() -> impl Strategy<Value = Vec<UnitType>> {
    prop::collection::vec(prop::sample::select(UnitType::ALL.to_vec()), 1..24)
}

proptest! {
    #[test]
    fn resolve_is_pure(types in unit_types()) {
        let topo = topology_of(&types);
        for unit in topo.units() {
            for dir in [Direction::Input, Direction::Output] {
                for (buffer, _) in unit.buffers(dir) {
                    let first = resolve(&topo, &unit.name, buffer, dir);
                    let second = resolve(&topo, &unit.name, buffer, dir);
                    prop_assert!(first.is_ok());
                    prop_assert_eq!(first, second);
                }
            }
        }
    }

    #[test]
    fn addresses_never_collide(types in unit_types()) {
        let topo = topology_of(&types);
        for dir in [Direction::Input, Direction::Output] {
            let mut seen = HashSet::new();
            for unit in topo.units() {
                for (buffer, _) in unit.buffers(dir) {
                    let addr = resolve(&topo, &unit.name, buffer, dir).unwrap();
                    prop_assert!(!addr.is_null());
                    prop_assert!(seen.insert(addr), "{}@{} collides at {}", unit.name, buffer, addr);
                }
            }
        }
    }

    #[test]
    fn forward_labels_patch_to_their_index(n in 1usize..40, filler in 0usize..4) {
        let topo = topology_of(&[UnitType::Arithmetic]);

        // All references first, then the definitions, each after `filler` moves
        let mut text = String::new();
        for i in 0..n {
            text.push_str(&format!("l{i} -> u0@in0\n"));
        }
        let mut expected = Vec::new();
        let mut index = n;
        for i in 0..n {
            for _ in 0..filler {
                text.push_str("$0 -> u0@in1\n");
                index += 1;
            }
            text.push_str(&format!("l{i}:\n"));
            expected.push(index);
        }
        text.push_str("$0 -> u0@in1\n");

        let program = assemble(&topo, &text).unwrap();
        for (i, &target) in expected.iter().enumerate() {
            match program[i] {
                Instruction::MoveImmediate { value, .. } => {
                    prop_assert_eq!(value, ScadValue::from_u64(target as u64));
                }
                other => prop_assert!(false, "unexpected {:?}", other),
            }
        }
    }

    #[test]
    fn undefined_reference_is_unknown_symbol(name in "[a-z][a-z0-9_]{0,8}") {
        prop_assume!(scad_chip::MicroOp::from_token(&name).is_none());
        prop_assume!(name != "pc" && name != "null");

        let topo = topology_of(&[UnitType::Arithmetic]);
        let err = assemble(&topo, &format!("{name} -> pc")).unwrap_err();
        prop_assert_eq!(err, AssemblerError::UnknownSymbol { label: name, line: 1 });
    }
}
