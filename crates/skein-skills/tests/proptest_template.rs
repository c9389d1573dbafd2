//! Property-based tests: template parsing and prompt config documents.

use proptest::prelude::*;
use skein_core::ContextVariables;
use skein_skills::*;

fn arb_parameter() -> impl Strategy<Value = InputParameter> {
    ("[a-z_][a-z0-9_]{0,8}", ".*", ".*")
        .prop_map(|(name, description, default)| InputParameter::new(name, description, default))
}

fn arb_completion() -> impl Strategy<Value = CompletionConfig> {
    (
        0u32..=8,
        0u32..=4,
        0u32..=4096,
        1u32..=4,
        proptest::collection::vec(".{0,6}", 0..3),
    )
        .prop_map(|(t, p, max_tokens, n, stop_sequences)| CompletionConfig {
            temperature: t as f64 / 4.0,
            top_p: p as f64 / 4.0,
            max_tokens,
            number_of_responses: n,
            stop_sequences,
            ..Default::default()
        })
}

fn arb_config() -> impl Strategy<Value = PromptTemplateConfig> {
    (
        ".*",
        arb_completion(),
        proptest::collection::vec("[a-z]{1,6}", 0..3),
        proptest::collection::btree_map("[a-z][a-z0-9_]{0,8}", arb_parameter(), 0..4),
    )
        .prop_map(|(description, completion, services, params)| {
            let mut config = PromptTemplateConfig::from_completion_parameters(completion)
                .with_description(description)
                .with_default_services(services);
            for (name, mut param) in params {
                param.name = name;
                config = config.with_parameter(param);
            }
            config
        })
}

fn quote(value: &str) -> String {
    format!("'{}'", value.replace('\\', "\\\\").replace('\'', "\\'"))
}

proptest! {
    #[test]
    fn parse_never_panics(source in ".*") {
        let _ = PromptTemplate::parse(source);
    }

    #[test]
    fn text_without_open_braces_renders_verbatim(source in "[^{]*") {
        let t = PromptTemplate::parse(source.clone()).unwrap();
        let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
        let out = rt
            .block_on(t.render(&ContextVariables::new(), &[], &NoFunctions, 0))
            .unwrap();
        prop_assert_eq!(out, source);
    }

    #[test]
    fn quoted_literal_renders_its_value(value in ".*") {
        let t = PromptTemplate::parse(format!("{{{{ {} }}}}", quote(&value))).unwrap();
        prop_assert_eq!(t.blocks(), &[Block::Value(value)][..]);
    }

    #[test]
    fn config_document_roundtrip(config in arb_config()) {
        let doc = config.to_value().unwrap();
        let back = PromptTemplateConfig::from_dict(&doc).unwrap();
        prop_assert_eq!(back, config);
    }
}
