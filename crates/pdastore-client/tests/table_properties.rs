use std::collections::HashSet;

use proptest::prelude::*;

use pdastore_client::message::UnsignedTransaction;
use pdastore_client::{build_transaction, Address, FreshnessToken, Permission, Requisition};

const PAYER: Address = Address::new([200u8; 32]);

/// Small address space so that requisitions share accounts. Read-only
/// signers and writable accounts never share an address, since merging them
/// would produce a second writable signer.
fn reference() -> impl Strategy<Value = (Address, Permission)> {
    prop_oneof![
        (1u8..4).prop_map(|b| (Address::new([b; 32]), Permission::Signer)),
        (4u8..24, 0u8..2).prop_map(|(b, bits)| {
            let permission = Permission::from_bits(bits).unwrap_or(Permission::ReadOnly);
            (Address::new([b; 32]), permission)
        }),
    ]
}

fn requisition() -> impl Strategy<Value = Requisition> {
    (
        100u8..104,
        prop::collection::vec(reference(), 1..8),
        prop::collection::vec(any::<u8>(), 0..64),
    )
        .prop_map(|(program, refs, payload)| {
            refs.into_iter()
                .fold(Requisition::builder().with_program(Address::new([program; 32])), |b, (a, p)| {
                    b.push_account(a, p)
                })
                .set_payload(payload)
                .build()
                .unwrap()
        })
}

fn compile(requisitions: &[Requisition]) -> UnsignedTransaction {
    build_transaction(&PAYER, FreshnessToken::new([1u8; 32]), requisitions).unwrap()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    #[test]
    fn table_is_deduplicated_and_grouped(rqs in prop::collection::vec(requisition(), 1..4)) {
        let tx = compile(&rqs);
        let keys = tx.account_keys();

        prop_assert_eq!(keys[0], PAYER);
        prop_assert_eq!(keys.iter().collect::<HashSet<_>>().len(), keys.len());

        let perms: Vec<Permission> = (0..keys.len()).map(|i| tx.permission_of(i)).collect();
        // Signers first, then writable before read-only inside each group.
        for pair in perms.windows(2) {
            prop_assert!(pair[0].bits() >= pair[1].bits(), "{:?}", perms);
        }
        prop_assert_eq!(tx.required_signers().len(), perms.iter().filter(|p| p.is_signer()).count());
    }

    #[test]
    fn merged_permission_covers_every_reference(rqs in prop::collection::vec(requisition(), 1..4)) {
        let tx = compile(&rqs);
        for (rq, ix) in rqs.iter().zip(tx.instructions()) {
            prop_assert_eq!(tx.account_keys()[ix.program_index as usize], *rq.program());
            prop_assert_eq!(&ix.payload[..], rq.payload());
            for (r, &index) in rq.accounts().iter().zip(&ix.account_indices) {
                prop_assert_eq!(tx.account_keys()[index as usize], r.address);
                let granted = tx.permission_of(index as usize).bits();
                prop_assert_eq!(granted & r.permission.bits(), r.permission.bits());
            }
        }
    }

    #[test]
    fn encoding_is_deterministic_and_decodable(rqs in prop::collection::vec(requisition(), 1..4)) {
        let tx = compile(&rqs);
        let bytes = tx.encode();
        prop_assert_eq!(&compile(&rqs).encode(), &bytes);
        prop_assert_eq!(UnsignedTransaction::decode(&bytes).unwrap(), tx);
    }
}
