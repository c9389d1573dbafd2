//! Native skills that ship with the kernel.

use futures::FutureExt;

use crate::collection::Skill;
use crate::function::NativeFunction;
use crate::kernel::Kernel;
use skein_core::{ContextVariables, FunctionName, Result};
use skein_llm::CompletionConfig;
use skein_skills::{FunctionCaller, PromptTemplateConfig};

/// String helpers operating on `input`. Conventionally imported as `text`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TextSkill;

fn map_input(
    name: &str,
    description: &str,
    f: fn(&str) -> String,
) -> NativeFunction {
    NativeFunction::from_fn(name, description, move |ctx| {
        let out = f(ctx.input());
        ctx.set_input(out);
        Ok(())
    })
}

impl Skill for TextSkill {
    fn functions(&self) -> Vec<NativeFunction> {
        vec![
            map_input("trim", "Remove leading and trailing whitespace", |s| {
                s.trim().to_string()
            }),
            map_input("trim_start", "Remove leading whitespace", |s| {
                s.trim_start().to_string()
            }),
            map_input("trim_end", "Remove trailing whitespace", |s| {
                s.trim_end().to_string()
            }),
            map_input("uppercase", "Convert to uppercase", str::to_uppercase),
            map_input("lowercase", "Convert to lowercase", str::to_lowercase),
        ]
    }
}

const SUMMARIZE_PROMPT: &str = "\
BEGIN CONTENT TO SUMMARIZE:
{{$input}}
END CONTENT TO SUMMARIZE.

Summarize the conversation in 'CONTENT TO SUMMARIZE', naming the main points of \
discussion and any conclusions that were reached.
Use only the content above. Write plain sentences without markup or tags.

BEGIN SUMMARY:
";

/// Roughly four characters per token for a 1024-token chunk.
const DEFAULT_CHUNK_CHARS: usize = 4096;

/// Summarizes long conversations chunk by chunk through an inline semantic
/// function. Conventionally imported as `conversation_summary`.
#[derive(Debug, Clone)]
pub struct ConversationSummarySkill {
    summarize: FunctionName,
    chunk_chars: usize,
}

impl ConversationSummarySkill {
    /// Registers the summarizing prompt on `kernel`.
    pub fn new(kernel: &Kernel) -> Result<Self> {
        let config = PromptTemplateConfig::from_completion_parameters(CompletionConfig {
            max_tokens: 1024,
            temperature: 0.1,
            top_p: 0.5,
            ..Default::default()
        })
        .with_description("Summarize a chunk of conversation");
        let summarize = kernel.create_semantic_function(SUMMARIZE_PROMPT, config)?;
        Ok(Self {
            summarize: summarize.function_name(),
            chunk_chars: DEFAULT_CHUNK_CHARS,
        })
    }

    pub fn with_chunk_chars(mut self, chunk_chars: usize) -> Self {
        self.chunk_chars = chunk_chars.max(1);
        self
    }
}

impl Skill for ConversationSummarySkill {
    fn functions(&self) -> Vec<NativeFunction> {
        let summarize = self.summarize.clone();
        let chunk_chars = self.chunk_chars;
        vec![NativeFunction::from_async(
            "summarize_conversation",
            "Summarize a conversation transcript, one chunk at a time",
            move |ctx| {
                let summarize = summarize.clone();
                async move {
                    let chunks = chunk_lines(ctx.input(), chunk_chars);
                    let mut summaries = Vec::with_capacity(chunks.len());
                    for chunk in chunks {
                        let variables = ContextVariables::with_input(chunk);
                        let summary = ctx
                            .call_function(&summarize, variables, ctx.depth() + 1)
                            .await?;
                        summaries.push(summary);
                    }
                    ctx.set_input(summaries.join("\n"));
                    Ok(())
                }
                .boxed()
            },
        )]
    }
}

/// Group non-blank lines into chunks of at most `max_chars` bytes. A line
/// longer than that is split at whitespace where possible.
fn chunk_lines(text: &str, max_chars: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();
    for line in text.lines().map(str::trim).filter(|l| !l.is_empty()) {
        for piece in split_long_line(line, max_chars) {
            if !current.is_empty() && current.len() + 1 + piece.len() > max_chars {
                chunks.push(std::mem::take(&mut current));
            }
            if !current.is_empty() {
                current.push('\n');
            }
            current.push_str(piece);
        }
    }
    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

fn split_long_line(line: &str, max_chars: usize) -> Vec<&str> {
    let mut pieces = Vec::new();
    let mut rest = line;
    while rest.len() > max_chars {
        let mut cut = max_chars;
        while cut > 0 && !rest.is_char_boundary(cut) {
            cut -= 1;
        }
        match rest[..cut].rfind(char::is_whitespace) {
            Some(ws) if ws > 0 => cut = ws,
            _ if cut == 0 => cut = rest.chars().next().map_or(rest.len(), char::len_utf8),
            _ => {}
        }
        pieces.push(rest[..cut].trim_end());
        rest = rest[cut..].trim_start();
    }
    if !rest.is_empty() {
        pieces.push(rest);
    }
    pieces
}
