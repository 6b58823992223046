//! Stage instructions and output schemas for the reasoning service.
//!
//! Every classification stage answers with one JSON object of booleans, one
//! key per flag of its closed vocabulary, exactly one of them true.

use bait_shared::{Severity, Stage};
use serde_json::{json, Map, Value};

/// Search budget for the web-search stages.
pub const MAX_SEARCH_ATTEMPTS: u32 = 4;

const CATEGORY: &str = r#"Decide what kind of message the user supplied: a text message or email, or the transcript of a voicemail.

Look at the structure and register of the input: headers such as From/Subject, signatures, links and short written phrasing point to text or email. A speaker introducing themselves, spoken filler, a request to call back and a callback number read out loud point to a voicemail transcript. When both kinds of cues are present, pick the dominant one.

Set exactly one flag to true:
- "is_textoremail": a text message or an email
- "is_voicemail": a voicemail transcript"#;

const VALIDITY: &str = r#"Extract every phone number, email address and URL from the user's message and check whether each one is legitimate by searching the web. Use queries such as "<number> real", "<address> legitimacy" or "<url> legitimacy", try alternate spellings or formats once if the first search finds nothing, never repeat an identical query and never quote search terms.

Base the answer only on reputable sources: official company pages, government sites, well-known consumer protection resources.

Set exactly one flag to true:
- "is_legitimate": every extracted element is confirmed legitimate by an authoritative source
- "na": anything else, including no elements found, mixed results, or nothing conclusive"#;

const MESSAGE_CONTENT: &str = r#"Read the user's message and count the phishing cues it contains. Cues include:
- pressure to act within minutes or hours, or "immediately", "today only"
- obfuscated brand names or look-alike addresses (P@ypal, fed-ex-support.com)
- prizes, refunds or rewards that were never requested
- impersonation of a bank, carrier, tax office, court or support desk
- requests for passwords, codes, card numbers or identity documents
- unusual top-level domains or shortened links
- spelling and grammar errors, excessive capitals or exclamation marks
- callback instructions that bypass official channels, such as "call this number instead of the one on your card" or a special extension for the fraud team

Legitimate organisations give days or weeks to respond and point to their published contact details. Retail promotions also use urgency; do not count ordinary sales pressure from a real brand.

Set exactly one flag to true:
- "high_risk": four or more cues
- "low_risk": two or three cues
- "no_risk": at most one cue"#;

const DOMAIN_REPUTATION: &str = r#"Find the URL or domain in the user's message. If there is one, search for its registration record with queries such as "<domain> whois" or "whois <domain> registrar", preferring public WHOIS sources (icann.org, who.is, whois.domaintools.com, whoxy.com).

From the record, note creation date, expiry date, registrar, name servers and whether contact details are privacy-redacted. A domain registered only weeks ago, one expiring very soon, or an unusual registrar together with redacted contacts are risk factors. Answer quickly; a couple of searches are enough.

Set exactly one flag to true:
- "high_risk": the domain is very young, expires soon or shows other clear risk factors
- "no_risk": the record was found and shows no risk factors
- "na": no domain in the message, or no record found"#;

const PHONE_NUMBER: &str = r#"Find the phone number in the user's voicemail transcript, the one the caller asks to be called back on or identifies as their own. Search for it with queries such as "<number> genuine" or "<number> legitimacy" and read the results carefully.

Set exactly one flag to true:
- "high_risk": reputable results report the number as a scam
- "na": no number in the transcript, no relevant results, or nothing confirming a scam"#;

const TRANSCRIPT_CONTENT: &str = r#"Read the user's voicemail transcript and count the phishing cues it contains. Cues include:
- deadlines of minutes or hours, threats of arrest, suspension or legal action
- impersonation of a bank, tax office, social security, court, utility or tech support
- a callback number that differs from the organisation's published one, or a special extension for the fraud or security team
- requests to confirm card numbers, codes, identity or account details over the phone
- claims that cannot be true, such as a suspended social security number
- prizes or refunds that were never requested

Real institutions send written notice first and let people call the number they already know.

Set exactly one flag to true:
- "high_risk": four or more cues
- "low_risk": two or three cues
- "no_risk": at most one cue"#;

/// System instructions for a classification stage.
pub fn instructions(stage: Stage) -> String {
    let base = match stage {
        Stage::Category => CATEGORY,
        Stage::Validity => VALIDITY,
        Stage::MessageContent => MESSAGE_CONTENT,
        Stage::DomainReputation => DOMAIN_REPUTATION,
        Stage::PhoneNumber => PHONE_NUMBER,
        Stage::TranscriptContent => TRANSCRIPT_CONTENT,
        Stage::Conclusion => return String::new(),
    };

    let mut text = base.to_string();
    if matches!(stage, Stage::Validity | Stage::PhoneNumber) {
        text.push_str(&format!(
            "\n\nDo not exceed {} search attempts. If nothing is confirmed by then, answer \"na\".",
            MAX_SEARCH_ATTEMPTS
        ));
    }
    text.push_str("\n\nRespond with the JSON object only.");
    text
}

/// Strict JSON schema of a stage's flag object.
pub fn flag_schema(stage: Stage) -> Value {
    let names = stage.flag_names();
    let properties: Map<String, Value> = names
        .iter()
        .map(|name| (name.to_string(), json!({ "type": "boolean" })))
        .collect();

    json!({
        "type": "object",
        "properties": properties,
        "required": names,
        "additionalProperties": false,
    })
}

/// Schema name sent with structured-output requests.
pub fn schema_name(stage: Stage) -> String {
    format!("{}_flags", stage.as_str())
}

/// Instructions for the conclusion stage; the tier is already decided.
pub fn conclusion_instructions(score: u32, severity: Severity) -> String {
    format!(
        r#"The message the user supplied has been analysed. Its risk tier is: {label} ({meaning}).
Accumulated risk factor: {score}.

Write the verdict for the user in at most two sentences on one line: first a one-sentence conclusion that matches the tier above, then optionally one short suggestion of what to do next.

Rules:
- Do not state a different tier or invent your own verdict.
- Do not mention the risk factor or any number from it.
- Plain text only, no headings, lists or quotes.

Example for a high tier: The message is very suspicious and highly likely to be a phishing scam. If you weren't expecting it, do not reply or call the number.
Example for a low tier: The message is not likely to be a phishing scam. No further action is needed."#,
        label = severity.label(),
        meaning = tier_meaning(severity),
        score = score,
    )
}

fn tier_meaning(severity: Severity) -> &'static str {
    match severity {
        Severity::High => "highly likely to be a phishing scam",
        Severity::Medium => "might be a phishing scam",
        Severity::Low => "not likely to be a phishing scam",
        Severity::None => "no sign of phishing",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_classifier_has_instructions_naming_its_flags() {
        for stage in Stage::CLASSIFIERS {
            let text = instructions(stage);
            for flag in stage.flag_names() {
                assert!(
                    text.contains(&format!("\"{}\"", flag)),
                    "{} instructions miss {}",
                    stage,
                    flag
                );
            }
        }
    }

    #[test]
    fn test_search_cap_only_on_validity_and_phone() {
        assert!(instructions(Stage::Validity).contains("Do not exceed 4 search attempts"));
        assert!(instructions(Stage::PhoneNumber).contains("Do not exceed 4 search attempts"));
        assert!(!instructions(Stage::MessageContent).contains("search attempts"));
    }

    #[test]
    fn test_schema_is_strict() {
        let schema = flag_schema(Stage::DomainReputation);
        assert_eq!(schema["additionalProperties"], false);
        assert_eq!(schema["required"], json!(["high_risk", "no_risk", "na"]));
        assert_eq!(schema["properties"]["na"]["type"], "boolean");
        assert_eq!(schema_name(Stage::DomainReputation), "domain_reputation_flags");
    }

    #[test]
    fn test_conclusion_instructions_embed_tier() {
        let text = conclusion_instructions(8, Severity::High);
        assert!(text.contains(Severity::High.label()));
        assert!(text.contains("risk factor: 8"));
        assert!(text.contains("at most two sentences"));
    }
}
