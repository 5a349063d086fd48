//! Prompt templates for contract analysis and contract Q&A.

use crate::models::ConversationMessage;

/// Instructions for the structured analysis call. The contract text is
/// appended after this block by [`build_analysis_prompt`].
pub const ANALYSIS_INSTRUCTIONS: &str = r#"You are an expert legal analyst reviewing data-analytics and consulting contracts on behalf of the service provider.

Before writing any output, reason step by step internally:
- Identify the key clauses.
- Evaluate the risks they create for the provider (financial liability, IP protection, service delivery timelines).
- Weigh each risk on a 1-10 scale (1 = low, 10 = high) by potential impact.
- Note ambiguities and anything that deserves a flag.

Tasks:
1. Extract key clauses: parties, term, payment, termination, liability, and any non-standard clauses. Give each a concise "clause_name" (e.g. "Payment Terms").
2. Score every clause from 1 to 10 for legal, financial, or operational risk and explain the score. Flag any clause scoring above 7 and any ambiguous section.
3. Highlight vague, unclear, or potentially disputable language.
4. Summarize the whole contract in one paragraph: key obligations, risks, and recommendations.

Example clause object:
{
  "clause_name": "Delivery Timeline",
  "clause_text": "The supplier shall deliver within 30 days.",
  "risk_score": 3,
  "risk_explanation": "Standard timeline with a low risk of delay.",
  "is_ambiguous": false,
  "ambiguity_details": ""
}

Respond with exactly one JSON object and no other text:
{
  "summary": "concise contract summary",
  "clauses": [clause objects like the example above],
  "flags": ["high-risk or ambiguity flags, e.g. 'High risk in payment terms'"],
  "overall_risk_score": null
}
Leave "overall_risk_score" as null; it is computed from the clause scores."#;

pub fn build_analysis_prompt(contract_text: &str) -> String {
    format!(
        "{}\n\n## Contract Text\n\n{}\n",
        ANALYSIS_INSTRUCTIONS, contract_text
    )
}

/// Single-turn retrieval prompt. Empty context still produces a valid prompt;
/// the model is told to say the answer cannot be determined.
pub fn build_answer_prompt(context: &str, question: &str) -> String {
    format!(
        r#"You are a helpful assistant specializing in contract analysis. Use the following context retrieved from the uploaded contracts to answer the user's question.

Context:
{context}

Question: {question}

Answer clearly and concisely using only the context above. Do not add outside knowledge. If the context does not contain the answer, reply that it cannot be determined from the context and suggest rephrasing the question."#
    )
}

/// Retrieval prompt that also carries the prior chat turns.
pub fn build_conversational_prompt(
    history: &[ConversationMessage],
    context: &str,
    question: &str,
) -> String {
    let chat_history = history
        .iter()
        .map(|m| format!("{}: {}", m.role.as_str(), m.content))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        r#"You are a helpful assistant specializing in contract analysis. Use the chat history and the context retrieved from the uploaded contracts to answer the user's question.

Chat History:
{chat_history}

Context:
{context}

Question: {question}

Keep the conversation flowing and base the answer only on the context and history above. If they do not contain the answer, reply that it cannot be determined from the context."#
    )
}
