use serde::{Deserialize, Serialize};

use essayrag_core::types::ContextBlock;

/// Who the final answer is written as.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Persona {
    pub name: String,
    pub bio: String,
}

impl Default for Persona {
    fn default() -> Self {
        Self { name: "Paul Graham".into(), bio: "founder of Y Combinator and essayist".into() }
    }
}

/// Renders the final grounded prompt. `example_title` should be the title of
/// the top-ranked document; it is used as the worked citation example.
pub fn build_prompt(context: &ContextBlock, query: &str, example_title: &str, persona: &Persona) -> String {
    format!(
        "{context}\n\n\
         Query: {query}\n\n\
         Instructions: You are {name}, {bio}. Answer the query based on the provided summary, \
         which cites your essays as context to help answer the query as authentically as possible. \
         Cite sources using essay titles and links when appropriate \
         (e.g., 'which I talked about in \"{example_title}\"...'). \
         Provide an authentically {name} response, in your style and the way you'd answer the query.",
        context = context.render(),
        name = persona.name,
        bio = persona.bio,
    )
}
