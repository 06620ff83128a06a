//! LLM prompts for question generation, enrichment, follow-up and judging.

/// Collection of prompts used by the test pipeline.
pub struct Prompts;

impl Prompts {
    /// System prompt describing the assistant under test.
    pub fn assistant_persona() -> &'static str {
        "You are an AI assistant helping an application developer understand generative AI. You explain complex concepts in simple language, using Python examples if it helps. You limit replies to 50 words or less. If you don't know the answer, say 'I don't know'. If the question is not related to building AI applications, Python, or Large Language Models (LLMs), say 'That doesn't seem to be about AI'."
    }

    /// Prefix of the user message that turns a question into an article summary.
    pub fn enrichment() -> &'static str {
        "You will be provided with a question about building applications that use generative AI technology. Write a 50 word summary of an article that would be a great answer to the question. Consider enriching the question with additional topics that the question asker might want to understand. Write the summary in the present tense, as though the article exists. If the question is not related to building AI applications, Python, or Large Language Models (LLMs), say 'That doesn't seem to be about AI'.\n"
    }

    /// System prompt for writing a follow-up question to a matched summary.
    pub fn follow_up() -> &'static str {
        "You will be provided with a summary of an article about building applications that use generative AI technology. Write a question of no more than 10 words that a reader might ask as a follow up to reading the article."
    }

    /// System prompt for classifying a follow-up question as on-topic.
    pub fn follow_up_on_topic() -> &'static str {
        "You are an AI assistant helping a team of developers understand AI. You explain complex concepts in simple language. Respond 'yes' if the follow-up question is about AI, otherwise respond 'no'."
    }

    /// Persona system prompt: application developer.
    pub fn developer_persona() -> &'static str {
        "You are a software developer who builds applications with Python and is starting to use Large Language Models. You ask practical, hands-on questions about APIs, prompt design, embeddings, retrieval-augmented generation, and how to structure code that calls generative AI services."
    }

    /// Persona system prompt: software tester.
    pub fn tester_persona() -> &'static str {
        "You are a software tester responsible for the quality of applications that use generative AI. You ask questions about evaluating model output, test automation, regression testing of prompts, hallucination detection, safety checks, and measuring accuracy and reliability."
    }

    /// Persona system prompt: business analyst.
    pub fn business_analyst_persona() -> &'static str {
        "You are a business analyst exploring how generative AI can support your organisation. You ask questions about use cases, costs, risks, governance, data privacy, return on investment, and how to explain AI capabilities and limitations to stakeholders."
    }

    /// User prompt asking a persona for `{count}` questions.
    pub fn generate_questions() -> &'static str {
        "Generate {count} distinct questions you would ask an AI learning assistant about building applications with generative AI and Large Language Models. Write each question in your own voice, on its own line, with no numbering, no bullet points, and no other text."
    }

    /// System prompt shared by the judges.
    pub fn judge_system() -> &'static str {
        "You are an expert evaluator of answers given by AI learning assistants to developers. You are strict, consistent, and concise."
    }

    /// User prompt for judging a generated answer against the original question.
    pub fn judge() -> &'static str {
        r#"Evaluate how well the following answer responds to the question.

Question: {question}

Answer: {answer}

Rate the answer from 1 (irrelevant or wrong) to 10 (complete, accurate, and directly relevant). Reply in the format:
Score: <1-10>
Reason: <one sentence>"#
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompts_are_not_empty() {
        assert!(!Prompts::assistant_persona().is_empty());
        assert!(Prompts::enrichment().ends_with('\n'));
        assert!(!Prompts::follow_up().is_empty());
        assert!(!Prompts::follow_up_on_topic().is_empty());
        assert!(!Prompts::developer_persona().is_empty());
        assert!(!Prompts::tester_persona().is_empty());
        assert!(!Prompts::business_analyst_persona().is_empty());
    }

    #[test]
    fn test_templates_have_placeholders() {
        assert!(Prompts::generate_questions().contains("{count}"));
        assert!(Prompts::judge().contains("{question}"));
        assert!(Prompts::judge().contains("{answer}"));
    }
}
