#[cfg(test)]
mod tests {
    use skein_config::{KernelConfig, ServiceConfig, SkeinConfig};
    use skein_core::{GLOBAL_SKILL, SkeinError};
    use skein_kernel::core_skills::{ConversationSummarySkill, TextSkill};
    use skein_kernel::*;
    use skein_llm::MockTextCompletion;
    use skein_skills::{PromptTemplateConfig, SemanticFunctionConfig};
    use std::sync::Arc;

    fn constant(name: &'static str, output: &'static str) -> NativeFunction {
        NativeFunction::from_fn(name, "Writes a constant", move |ctx| {
            ctx.set_input(output);
            Ok(())
        })
    }

    struct Versioned(&'static str);

    impl Skill for Versioned {
        fn functions(&self) -> Vec<NativeFunction> {
            vec![constant("f", self.0)]
        }
    }

    // ── Registration ───────────────────────────────────────────

    #[test]
    fn test_import_skill_registers_every_function() {
        let kernel = Kernel::new();
        let registered = kernel.import_skill(&TextSkill, "text").unwrap();
        assert_eq!(registered.len(), 5);
        assert_eq!(kernel.skills().count(), 5);
        assert!(kernel.func("TEXT", "Trim").is_ok());

        let views = kernel.skills().list();
        assert!(views.iter().all(|v| v.skill == "text" && !v.is_semantic));
    }

    #[test]
    fn test_invalid_names_rejected() {
        let kernel = Kernel::new();
        assert!(matches!(
            kernel.import_skill(&TextSkill, "my-text"),
            Err(SkeinError::InvalidName { .. })
        ));
        let cfg =
            SemanticFunctionConfig::from_source(PromptTemplateConfig::default(), "x").unwrap();
        assert!(kernel.register_semantic_function("ok", "not ok", cfg).is_err());
        assert!(kernel.skills().is_empty());
    }

    #[test]
    fn test_func_not_found() {
        let kernel = Kernel::new();
        match kernel.func("nope", "missing") {
            Err(SkeinError::FunctionNotFound { skill, function }) => {
                assert_eq!(skill, "nope");
                assert_eq!(function, "missing");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_last_writer_wins() {
        let kernel = Kernel::new();
        kernel.import_skill(&Versioned("first"), "s").unwrap();
        let ctx = kernel.run("", &[kernel.func("s", "f").unwrap()]).await;
        assert_eq!(ctx.input(), "first");

        kernel.import_skill(&Versioned("second"), "S").unwrap();
        assert_eq!(kernel.skills().count(), 1);
        let ctx = kernel.run("", &[kernel.func("s", "F").unwrap()]).await;
        assert_eq!(ctx.input(), "second");
    }

    #[tokio::test]
    async fn test_reregistration_seen_by_template_calls() {
        let kernel = Kernel::new();
        kernel
            .add_text_completion_service("echo", Arc::new(MockTextCompletion::new("echo").echoing()));
        kernel.import_skill(&Versioned("first"), "s").unwrap();
        let caller = kernel
            .create_semantic_function("got {{s.f}}", PromptTemplateConfig::default())
            .unwrap();

        assert_eq!(kernel.run("", &[caller.clone()]).await.input(), "got first");
        kernel.import_skill(&Versioned("second"), "s").unwrap();
        assert_eq!(kernel.run("", &[caller]).await.input(), "got second");
    }

    #[tokio::test]
    async fn test_context_keeps_its_registry_snapshot() {
        let kernel = Kernel::new();
        kernel
            .add_text_completion_service("echo", Arc::new(MockTextCompletion::new("echo").echoing()));
        kernel.import_skill(&Versioned("old"), "s").unwrap();
        let caller = kernel
            .create_semantic_function("{{s.f}}", PromptTemplateConfig::default())
            .unwrap();

        let ctx = kernel.create_context("");
        kernel.import_skill(&Versioned("new"), "s").unwrap();
        let ctx = kernel.run_in_context(ctx, &[caller]).await;
        assert_eq!(ctx.input(), "old");
    }

    #[test]
    fn test_create_semantic_function_names() {
        let kernel = Kernel::new();
        let a = kernel
            .create_semantic_function("a", PromptTemplateConfig::default())
            .unwrap();
        let b = kernel
            .create_semantic_function("b", PromptTemplateConfig::default())
            .unwrap();
        assert_eq!(a.skill(), GLOBAL_SKILL);
        assert!(a.name().starts_with("func"));
        assert_eq!(a.name().len(), "func".len() + 32);
        assert_ne!(a.name(), b.name());
        assert!(kernel.func(GLOBAL_SKILL, a.name()).is_ok());
        assert!(kernel.create_semantic_function("{{$x", PromptTemplateConfig::default()).is_err());
    }

    #[test]
    fn test_import_semantic_skill_is_all_or_nothing() {
        let kernel = Kernel::new();
        let err = kernel
            .import_semantic_skill(
                "fun",
                vec![
                    ("joke", PromptTemplateConfig::default(), "Joke: {{$input}}"),
                    ("limerick", PromptTemplateConfig::default(), "broken {{"),
                ],
            )
            .unwrap_err();
        assert!(matches!(err, SkeinError::TemplateSyntax { .. }));
        assert!(kernel.skills().is_empty());

        let registered = kernel
            .import_semantic_skill(
                "fun",
                vec![
                    (
                        "joke",
                        PromptTemplateConfig::default().with_description("Joke"),
                        "Joke: {{$input}}",
                    ),
                    ("limerick", PromptTemplateConfig::default(), "Limerick: {{$input}}"),
                ],
            )
            .unwrap();
        assert_eq!(registered.len(), 2);
        assert_eq!(kernel.func("fun", "joke").unwrap().description(), "Joke");
        assert!(kernel.func("fun", "limerick").unwrap().is_semantic());
    }

    // ── Services ───────────────────────────────────────────────

    #[test]
    fn test_service_registry_management() {
        let kernel = Kernel::new();
        kernel.add_text_completion_service("a", Arc::new(MockTextCompletion::new("a")));
        kernel.add_text_completion_service("b", Arc::new(MockTextCompletion::new("b")));
        assert_eq!(kernel.services().default_id(), Some("a"));

        kernel.add_text_completion_service_as_default("c", Arc::new(MockTextCompletion::new("c")));
        assert_eq!(kernel.services().default_id(), Some("c"));

        kernel.set_default_text_completion_service("b").unwrap();
        assert_eq!(kernel.services().default_id(), Some("b"));
        assert!(kernel.set_default_text_completion_service("zzz").is_err());

        assert!(kernel.remove_text_completion_service("b"));
        assert!(!kernel.remove_text_completion_service("b"));
        assert_eq!(kernel.services().ids(), vec!["a", "c"]);
        assert_eq!(kernel.services().default_id(), None);
    }

    #[test]
    fn test_service_snapshot_is_copy_on_write() {
        let kernel = Kernel::new();
        kernel.add_text_completion_service("a", Arc::new(MockTextCompletion::new("a")));
        let before = kernel.services();
        kernel.add_text_completion_service("b", Arc::new(MockTextCompletion::new("b")));
        assert_eq!(before.ids(), vec!["a"]);
        assert_eq!(kernel.services().ids(), vec!["a", "b"]);
    }

    // ── Settings ───────────────────────────────────────────────

    #[test]
    fn test_from_config_registers_services() {
        let mut oai = ServiceConfig::openai("davinci", "text-davinci-003");
        oai.api_key = Some("sk-test".into());
        let mut az = ServiceConfig::azure("azure_davinci", "davinci");
        az.api_key = Some("az-test".into());
        az.endpoint = Some("https://example.openai.azure.com".into());
        az.default = true;

        let config = SkeinConfig {
            kernel: KernelConfig { max_render_depth: 4 },
            services: vec![oai, az],
            ..Default::default()
        };
        let kernel = Kernel::from_config(&config).unwrap();

        assert_eq!(kernel.settings().max_render_depth, 4);
        assert_eq!(kernel.services().ids(), vec!["azure_davinci", "davinci"]);
        assert_eq!(kernel.services().default_id(), Some("azure_davinci"));
        assert_eq!(kernel.create_context("").max_render_depth(), 4);
    }

    #[test]
    fn test_from_config_rejects_invalid_settings() {
        let mut a = ServiceConfig::openai("same", "m");
        a.api_key = Some("k".into());
        let config = SkeinConfig {
            services: vec![a.clone(), a],
            ..Default::default()
        };
        assert!(matches!(
            Kernel::from_config(&config),
            Err(SkeinError::Config(_))
        ));
    }

    #[test]
    fn test_from_config_missing_key_fails_construction() {
        let config = SkeinConfig {
            services: vec![ServiceConfig::openai("davinci", "text-davinci-003")],
            ..Default::default()
        };
        let err = Kernel::from_config(&config).err().unwrap();
        assert!(err.to_string().contains("API key"));
    }

    // ── Built-in skill & blocking entry points ─────────────────

    #[tokio::test]
    async fn test_text_skill() {
        let kernel = Kernel::new();
        kernel.import_skill(&TextSkill, "text").unwrap();
        let f = |name: &str| kernel.func("text", name).unwrap();

        let ctx = kernel.run("  Hello World  ", &[f("trim"), f("uppercase")]).await;
        assert_eq!(ctx.input(), "HELLO WORLD");

        assert_eq!(kernel.run("  x  ", &[f("trim_start")]).await.input(), "x  ");
        assert_eq!(kernel.run("  x  ", &[f("trim_end")]).await.input(), "  x");
        assert_eq!(kernel.run("MiXeD", &[f("lowercase")]).await.input(), "mixed");
    }

    #[tokio::test]
    async fn test_conversation_summary_calls_semantic_function_per_chunk() {
        let kernel = Kernel::new();
        let mock = Arc::new(
            MockTextCompletion::new("mock")
                .with_response("John greeted Jane.")
                .with_response("They said goodbye."),
        );
        let requests = mock.recorded_requests();
        kernel.add_text_completion_service("mock", mock);

        let skill = ConversationSummarySkill::new(&kernel).unwrap().with_chunk_chars(32);
        kernel.import_skill(&skill, "conversation_summary").unwrap();
        let summarize = kernel
            .func("conversation_summary", "summarize_conversation")
            .unwrap();

        let transcript = "John: Hi Jane.\nJane: Hello John.\n\nJohn: Bye now.\nJane: Bye.";
        let ctx = kernel.run(transcript, &[summarize]).await;

        assert_eq!(
            ctx.into_result().unwrap().input(),
            "John greeted Jane.\nThey said goodbye."
        );
        let requests = requests.lock();
        assert_eq!(requests.len(), 2);
        assert!(requests[0].prompt.contains("John: Hi Jane.\nJane: Hello John."));
        assert!(!requests[0].prompt.contains("Bye"));
        assert!(requests[1].prompt.contains("John: Bye now.\nJane: Bye."));
        assert_eq!(requests[0].config.max_tokens, 1024);
        assert_eq!(requests[0].config.top_p, 0.5);
    }

    #[tokio::test]
    async fn test_conversation_summary_surfaces_service_errors() {
        let kernel = Kernel::new();
        kernel.add_text_completion_service(
            "mock",
            Arc::new(MockTextCompletion::new("mock").with_error("HTTP 401: bad key")),
        );
        let skill = ConversationSummarySkill::new(&kernel).unwrap();
        kernel.import_skill(&skill, "conversation_summary").unwrap();
        let summarize = kernel
            .func("conversation_summary", "summarize_conversation")
            .unwrap();

        let ctx = kernel.run("John: hi", &[summarize]).await;
        assert!(matches!(ctx.last_error(), Some(SkeinError::Service { .. })));
    }

    #[test]
    fn test_invoke_blocking() {
        let kernel = Kernel::new();
        kernel.import_skill(&TextSkill, "text").unwrap();
        let upper = kernel.func("text", "uppercase").unwrap();
        let ctx = upper.invoke_blocking(kernel.create_context("quiet"));
        assert_eq!(ctx.input(), "QUIET");
    }

    #[test]
    fn test_run_blocking() {
        let kernel = Kernel::new();
        kernel.add_text_completion_service(
            "mock",
            Arc::new(MockTextCompletion::new("mock").with_response("done")),
        );
        let f = kernel
            .create_semantic_function("{{$input}}", PromptTemplateConfig::default())
            .unwrap();
        let ctx = kernel.run_blocking("go", &[f]);
        assert_eq!(ctx.into_result().unwrap().input(), "done");
    }

    #[test]
    fn test_native_handler_can_use_anyhow() {
        fn parse_count(raw: &str) -> anyhow::Result<usize> {
            Ok(raw.trim().parse::<usize>()?)
        }

        let kernel = Kernel::new();
        struct Parse;
        impl Skill for Parse {
            fn functions(&self) -> Vec<NativeFunction> {
                vec![NativeFunction::from_fn("double", "Doubles a number", |ctx| {
                    let n = parse_count(ctx.input())?;
                    ctx.set_input((n * 2).to_string());
                    Ok(())
                })]
            }
        }
        kernel.import_skill(&Parse, "math").unwrap();
        let f = kernel.func("math", "double").unwrap();

        assert_eq!(kernel.run_blocking("21", &[f.clone()]).input(), "42");
        let ctx = kernel.run_blocking("many", &[f]);
        assert!(matches!(ctx.last_error(), Some(SkeinError::Other(_))));
    }
}
