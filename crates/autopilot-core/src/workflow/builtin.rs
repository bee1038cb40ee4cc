//! Built-in workflows.
//!
//! `inquiry-to-quote` is the home-services demo: a messy customer inquiry is
//! parsed, routed, scoped, priced and checked against guardrails, after which
//! exactly one of three automations runs (instant quote, photo request or
//! human review summary).

use std::collections::HashMap;

use super::schema::{BranchDefinition, DecisionConfig, StepDefinition, WorkflowDefinition};
use super::template::PromptTemplate;

pub const INQUIRY_TO_QUOTE_ID: &str = "inquiry-to-quote";

/// Tiers below this margin get a suggested adjustment.
pub const MARGIN_FLOOR_PCT: u32 = 22;

/// Inquiry pre-filled in the intake box.
pub const SAMPLE_INQUIRY: &str = "I spilled 200 gallons of expired barbecue sauce across my driveway during a tailgate experiment gone wrong. Can you blast it clean by this Friday? The raccoons won't leave.";

/// All workflows shipped with the binary.
pub fn builtin_workflows() -> Vec<WorkflowDefinition> {
    vec![inquiry_to_quote()]
}

/// Look up a built-in workflow by id.
pub fn find_builtin(id: &str) -> Option<WorkflowDefinition> {
    builtin_workflows().into_iter().find(|wf| wf.id == id)
}

pub fn inquiry_to_quote() -> WorkflowDefinition {
    let steps: Vec<(&str, StepDefinition)> = vec![
        (
            "extract-features",
            step(
                "Extract Features",
                "Parse the messy inquiry into normalized features for downstream decisions.",
                "You are a precise intake parser for home-services quotes. Output strict JSON only.",
                EXTRACT_FEATURES_PROMPT,
                &[],
                None,
                "Intake",
                &["LLM", "Pricebook"],
                &[
                    "Parse the messy inquiry into normalized JSON",
                    "Capture who, what, quantities, and deadlines",
                    "Be resilient to typos or missing details",
                    "Flag ambiguous addresses and missing fields",
                ],
            ),
        ),
        (
            "decide-path",
            step(
                "Decide Path",
                "Choose one: quote_now, need_photos, or needs_human, with rationale + pillars.",
                "You map features to a sales/ops path. Output strict JSON only.",
                DECIDE_PATH_PROMPT,
                &["extract-features"],
                None,
                "Routing",
                &["LLM", "Routing"],
                &[
                    "Choose quote_now, need_photos, or needs_human",
                    "Return rationale and messaging pillars",
                    "Prefer human review for risky or unclear jobs",
                    "Route to photo request when surfaces lack clarity",
                ],
            ),
        ),
        (
            "estimate-scope",
            step(
                "Estimate Scope",
                "Infer missing sqft and crewHours using stable heuristics so pricing is consistent.",
                "You estimate scope conservatively. Output strict JSON only.",
                ESTIMATE_SCOPE_PROMPT,
                &["decide-path"],
                None,
                "Scope",
                &["LLM", "Heuristics"],
                &[
                    "Estimate square footage and crew hours with heuristics",
                    "Round sqft to the nearest 10 and hours to 0.1",
                    "Document assumptions for missing information",
                    "Boost labor for heavy stains or special handling",
                ],
            ),
        ),
        (
            "price-job",
            step(
                "Price Job",
                "Create Good/Better/Best, compute internal costs + margins (LLM math).",
                "You produce itemized tiers with simple internal cost model. Output strict JSON only.",
                PRICE_JOB_PROMPT,
                &["estimate-scope"],
                None,
                "Pricing",
                &["LLM", "Pricing"],
                &[
                    "Build Good/Better/Best pricing tiers",
                    "Calculate internal labor, chemical, travel, misc",
                    "Expose margin percentage for each tier",
                    "Add value bullets to support upsells",
                ],
            ),
        ),
        (
            "guardrails-present",
            step(
                "Guardrails & Presentation",
                "Protect margin, order tiers by buyer path, choose CTA, or propose adjustments.",
                "You enforce guardrails and tailor presentation. Output strict JSON only.",
                GUARDRAILS_PROMPT,
                &["price-job"],
                None,
                "Guardrails",
                &["LLM", "Guardrails"],
                &[
                    "Enforce the minimum margin guardrail",
                    "Select the CTA that matches the decision path",
                    "Hide tiers that violate guardrails",
                    "Suggest adjustments when a tier misses targets",
                ],
            ),
        ),
        (
            "compose-quote",
            step(
                "Compose Quote",
                "Markdown customer quote for shown tiers, short and friendly.",
                "You write concise, friendly Markdown. Output Markdown only (no fences).",
                COMPOSE_QUOTE_PROMPT,
                &["guardrails-present"],
                Some("quote_now"),
                "Automations",
                &["LLM", "Customer Comms"],
                &[
                    "Create a friendly Markdown quote",
                    "Respect the tier ordering from guardrails",
                    "Close with an on-brand booking CTA",
                    "Keep the copy brief and actionable",
                ],
            ),
        ),
        (
            "compose-photo-request",
            step(
                "Compose Photo Request",
                "Markdown guide asking for 2–3 photos to reduce uncertainty.",
                "You give clear, friendly instructions. Output Markdown only (no fences).",
                COMPOSE_PHOTO_REQUEST_PROMPT,
                &["guardrails-present"],
                Some("need_photos"),
                "Automations",
                &["LLM", "Photo Workflow"],
                &[
                    "Request 2–3 specific confirmation photos",
                    "Explain why images unblock accurate pricing",
                    "Match tone to the original inquiry",
                    "Close with clear next-step instructions",
                ],
            ),
        ),
        (
            "compose-human-summary",
            step(
                "Compose Human Review Summary",
                "Markdown summary for internal reviewer: risks/ambiguities and a suggested next step.",
                "You produce a crisp internal note. Output Markdown only (no fences).",
                COMPOSE_HUMAN_SUMMARY_PROMPT,
                &["guardrails-present"],
                Some("needs_human"),
                "Automations",
                &["LLM", "Human Handoff"],
                &[
                    "Summarize risks for the human reviewer",
                    "Suggest what to verify before quoting",
                    "Provide a quick outreach script",
                    "Keep the note under 120 words",
                ],
            ),
        ),
    ];

    let step_order = steps.iter().map(|(id, _)| id.to_string()).collect();
    let steps = steps
        .into_iter()
        .map(|(id, def)| (id.to_string(), def))
        .collect();

    let branches = HashMap::from([
        branch("quote_now", "Instant quote", "compose-quote"),
        branch("need_photos", "Request photos", "compose-photo-request"),
        branch("needs_human", "Human review", "compose-human-summary"),
    ]);

    WorkflowDefinition {
        id: INQUIRY_TO_QUOTE_ID.to_string(),
        name: "Inquiry-to-Quote Autopilot".to_string(),
        description: Some(
            "Turn a messy home-services inquiry into a priced, guardrailed quote, \
             a photo request, or a human review note."
                .to_string(),
        ),
        entry_step_id: "extract-features".to_string(),
        decision: DecisionConfig::new("guardrails-present"),
        step_order,
        steps,
        branches,
        variables: HashMap::from([(
            "margin_floor_pct".to_string(),
            MARGIN_FLOOR_PCT.to_string(),
        )]),
    }
}

#[allow(clippy::too_many_arguments)]
fn step(
    title: &str,
    description: &str,
    system: &str,
    prompt: &str,
    depends_on: &[&str],
    required_path: Option<&str>,
    stage: &str,
    badges: &[&str],
    guardrails: &[&str],
) -> StepDefinition {
    StepDefinition {
        title: title.to_string(),
        description: Some(description.to_string()),
        system: Some(system.to_string()),
        prompt: PromptTemplate::new(prompt),
        depends_on: depends_on.iter().map(|s| s.to_string()).collect(),
        required_path: required_path.map(str::to_string),
        stage: Some(stage.to_string()),
        badges: badges.iter().map(|s| s.to_string()).collect(),
        guardrails: guardrails.iter().map(|s| s.to_string()).collect(),
    }
}

fn branch(key: &str, label: &str, result_step_id: &str) -> (String, BranchDefinition) {
    (
        key.to_string(),
        BranchDefinition {
            label: label.to_string(),
            result_step_id: result_step_id.to_string(),
        },
    )
}

// ─── Prompts ──────────────────────────────────────────────────────────────

const EXTRACT_FEATURES_PROMPT: &str = r#"Inquiry:
"""
${customer_message}
"""

Extract conservative features. If unknown, use null/empty—not guesses.
- If the address is ambiguous or non-specific (e.g., landmark-only like 'white house' without city/zip), set address to null and add 'ambiguous_address' to riskFlags.
- If the inquiry mentions 'photo', 'photos', 'picture', or 'pictures', include a 'photos_requested' marker in riskFlags (non-risky flag used for routing).
Return STRICT JSON (no code fences):
{
  "contact": { "name": string | null, "email": string | null, "phone": string | null },
  "address": string | null,
  "surfaces": [ { "type": "driveway|patio|siding|walkway|deck|other", "sqft": number | null, "notes": string[] } ],
  "stains": string[],
  "timeHints": string[],
  "priceSensitivity": "low" | "medium" | "high" | "unknown",
  "readiness": "ready" | "shopping" | "hesitant" | "unknown",
  "riskFlags": string[],
  "channelPref": "email" | "sms" | "phone" | "unknown"
}"#;

const DECIDE_PATH_PROMPT: &str = r#"Features JSON:
${previous_step_output}

Rules:
- needs_human if any of: strong riskFlags (height/ladder/unsafe), unclear address + high risk language, or contradictory scope.
- need_photos if surfaces/areas are unclear OR stains mentioned without clarity, AND no serious risk.
- need_photos if the inquiry explicitly requests photos/pictures, provided there is no serious risk requiring needs_human.
- need_photos if address is ambiguous (e.g., landmark-only) but otherwise low-risk — use photos to disambiguate.
- quote_now only if surfaces clear enough AND address appears serviceable or not required for scope.

Also pick 3–5 messaging pillars for copy (e.g., longevity, safety for pets/plants, curb appeal, warranty, fast scheduling).
Return STRICT JSON:
{
  "path": "quote_now" | "need_photos" | "needs_human",
  "rationale": string,
  "pillars": string[]
}"#;

const ESTIMATE_SCOPE_PROMPT: &str = r#"Inputs (may be features or decision JSON):
${previous_step_output}

Original inquiry (for hints):
"""
${customer_message}
"""

Heuristics for missing sqft:
- driveway: 480; patio: 240; siding: 2000; walkway: 80.
- totalSqft = sum; crewHours = (totalSqft/300) + 0.5 setup; min 1.0; +0.5 if stains include oil/rust.
- Round sqft to nearest 10; crewHours to 1 decimal.
Return STRICT JSON:
{
  "areasBySurface": [{ "surface": "driveway|patio|siding|walkway|deck|other", "sqft": number }],
  "totalSqft": number,
  "crewHours": number,
  "assumptions": string[]
}"#;

const PRICE_JOB_PROMPT: &str = r#"Scope JSON:
${previous_step_output}

Cost heuristics:
- labor: $65 * crewHours
- chem: hard surfaces $0.08/sqft; siding $0.05/sqft
- travel: $15; misc: $15
Tier logic:
- Good: essential clean.
- Better: + pretreat if stains OR mild upsell.
- Best: + sealant/warranty style upsell.
Compute marginPct = (subtotal - (labor+chem+travel+misc)) / subtotal * 100 (1 decimal).
Return STRICT JSON:
{
  "tiers": [
    {
      "name": "Good" | "Better" | "Best",
      "lineItems": [{ "name": string, "price": number }],
      "subtotal": number,
      "estCost": { "labor": number, "chem": number, "travel": number, "misc": number },
      "marginPct": number,
      "valueBullets": [string, string, string]
    }
  ],
  "notes": string[]
}
Always return exactly three tiers, in the order Good, Better, Best."#;

const GUARDRAILS_PROMPT: &str = r#"Pricing JSON (merge with earlier decision and inquiry cues in your reasoning):
${previous_step_output}

Original inquiry (for explicit cues like 'photos' and address hints):
"""
${customer_message}
"""

Rules:
- Any tier with marginPct < ${margin_floor_pct} → add a suggested adjustment (increase $ or remove add-on).
- Path rules:
  - quote_now → order Best, Better, Good if priceSensitivity != 'high'; otherwise Value order Good, Better, Best.
  - need_photos → hide Better/Best, CTA 'send_photos'.
  - needs_human → hide all tiers; CTA 'needs_review'.
  - Prefer need_photos if the inquiry explicitly requests photos/pictures (keywords: photo, photos, picture, pictures) and there is no serious risk.
  - Prefer need_photos when address cues are ambiguous/landmark-only and otherwise low-risk.

Return STRICT JSON:
{
  "orderedTiers": ["Good","Better","Best"],
  "hiddenTiers": string[],
  "cta": "book_now" | "send_photos" | "needs_review",
  "adjustments": [
    { "tier": "Good|Better|Best", "action": "increase_price" | "remove_item", "amount": number, "note": string }
  ],
  "pathEcho": "quote_now" | "need_photos" | "needs_human"
}"#;

const COMPOSE_QUOTE_PROMPT: &str = r#"Presentation JSON (with orderedTiers & cta):
${previous_step_output}

Original inquiry (tone cues):
"""
${customer_message}
"""

Write a short Markdown quote:
- H2 title with job type (infer) e.g., '## Driveway & Patio Cleaning — Draft Quote'
- 3–4 value bullets tailored to likely pillars (longevity/safety/scheduling).
- Itemized tiers shown (in chosen order) with **Subtotal** lines, excluding hidden tiers.
- Close with a single CTA sentence matched to `cta` ('Reply to hold Mon 2–4pm', etc.)."#;

const COMPOSE_PHOTO_REQUEST_PROMPT: &str = r#"Presentation JSON (pathEcho should be 'need_photos'):
${previous_step_output}

Use the inquiry to tailor what photos to ask for:
"""
${customer_message}
"""

Write a concise Markdown note:
- H3 title 'Quick Photos to Finalize Your Quote'
- Bulleted list of 3 specific shots (wide area, close-up of stain, access/water spigot).
- One line about why it helps (accuracy, discounts if area is smaller).
- Closing line with channel choice (email/SMS)."#;

const COMPOSE_HUMAN_SUMMARY_PROMPT: &str = r#"Presentation JSON (pathEcho should be 'needs_human'):
${previous_step_output}

Original inquiry (for context):
"""
${customer_message}
"""

Write an internal Markdown summary:
- H3 'Manual Review Needed'
- Bullets: risks/ambiguities; what to verify; a suggested call/email script (1–2 lines).
- Keep under 120 words."#;
