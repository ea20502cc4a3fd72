use forge_macros::contract;

#[test]
fn builds_non_streamable_and_streamable_procedures() {
    let contract = contract! {
        ping {
            input: serde_json::json!({"type": "object"}),
            output: serde_json::json!({"type": "string"}),
        },
        tail {
            input: serde_json::json!({"type": "object"}),
            output: serde_json::json!({"type": "array"}),
            streamable,
        },
    };

    assert!(contract.get("ping").is_some());
    assert!(!contract.is_streamable("ping"));
    assert!(contract.is_streamable("tail"));
    assert_eq!(contract.len(), 2);
}

#[test]
fn carries_tagged_error_schemas() {
    let contract = contract! {
        withdraw {
            input: serde_json::json!({"type": "object"}),
            output: serde_json::json!({"type": "object"}),
            errors: {
                "insufficient-funds" => serde_json::json!({"type": "object"}),
            },
        },
    };

    let descriptor = contract.get("withdraw").unwrap();
    assert!(descriptor.errors.contains_key("insufficient-funds"));
}
