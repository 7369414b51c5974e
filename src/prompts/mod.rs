//! Prompt templates for the pipeline roles.
//!
//! Templates use `{placeholder}` substitution at the call site. The text
//! here is tunable content — the structural contract is only that the
//! Curator, Clerk, and Judge request JSON with the documented keys.

/// System prompt for the Scout (high-volume ideation).
pub const SCOUT_SYSTEM_PROMPT: &str = "You are a creative idea generator for a transit-security \
training program. Your job is to propose varied, challenging scenario ideas. Reply with one idea \
per line and nothing else.";

/// User prompt for seed generation.
pub const SCOUT_PROMPT: &str = r#"
Task: produce {count} raw one-line ideas for security training scenarios in the category "{category}".

Rules:
1. One idea per line.
2. Each idea is a single short sentence (10-30 words).
3. Maximum variety - every idea must differ from the previous ones.
4. Set the ideas in a light-rail station environment (platform, concourse, ticketing hall, stairs, technical rooms).
5. Include unusual, non-routine situations that put the officer in a dilemma.

Example format:
- A person in a heavy coat on a summer day lingers nervously near the ticketing gates
- An abandoned bag with protruding wires sits under a platform bench
- A low-flying drone hovers above the main entrance at rush hour

Now write {count} new, varied ideas:
"#;

/// User prompt for refining a raw idea list with a stronger model.
pub const SCOUT_REFINE_PROMPT: &str = r#"
Below is a raw list of one-line scenario ideas for the category "{category}".
Rewrite the list: sharpen vague ideas, drop filler words, keep one idea per line,
and keep every idea a single short sentence. Output only the refined list.

{ideas}
"#;

/// System prompt for the Curator (seed filtering).
pub const CURATOR_SYSTEM_PROMPT: &str = "You are the curator of a transit-security training \
program. You filter raw scenario ideas and keep only the best. Reply with JSON only.";

/// User prompt for seed curation. Expects a JSON reply:
/// `{"selected_seeds": [...], "reasoning": "..."}`.
pub const CURATOR_PROMPT: &str = r#"
Task: select the {count} best ideas from the list below.

Required category: {category}

Idea list:
{seeds}

Selection criteria, in order of importance:
1. Relevance - the idea fits the required category.
2. Realism - the idea is plausible, not fantasy.
3. Training value - the idea poses a dilemma or challenge for the officer.
4. Doctrine compliance - the idea does not encourage safety or legal violations.
5. Variety - pick ideas that differ from each other.

Reject ideas that:
- encourage touching a suspicious object
- involve profiling by ethnicity
- do not fit the category
- repeat one another

Required output (JSON only):
{
  "selected_seeds": ["idea 1", "idea 2", ...],
  "reasoning": "short explanation of the selection"
}
"#;

/// System prompt for the Writer (full scenario drafting).
pub const WRITER_SYSTEM_PROMPT: &str = r#"You are the architect of a transit-security training
program. You design complete training scenarios that test an officer's judgment under the
operating doctrine.

Iron rules (violating any of them is a failure):
- Never instruct touching or moving a suspicious object; minimum standoff 50 meters.
- Vehicle standoff: motorcycle 100 m, car 200 m, truck 400 m.
- Live fire only as a last resort: means + intent + immediate life threat.
- No profiling by ethnicity, religion, or origin.
- Every action follows the statutory authority framework.

Write professional, operational prose. Use precise figures from the doctrine."#;

/// User prompt for scenario generation. `{repair_section}`,
/// `{seeds_section}`, and `{gold_section}` may be empty.
pub const WRITER_PROMPT: &str = r#"{repair_section}{seeds_section}batch_id: {bundle_id}
category: {category}
count: {count}

Goal: write {count} distinct training scenarios in the category "{category}".

Quality rules:
- Full variety between scenarios.
- Clear chain of command: officer <-> control room <-> police / bomb disposal.
- Exact figures from the doctrine (standoff distances, level names).

Format for each scenario:
Title: [short, unique]
Category: {category}
Threat level: [low/medium/high/critical]
Likelihood: [low/medium/high]
Complexity: [low/medium/high]

Background:
- Location: [level + area in the station]
- Narrative: [plot, actors, the dilemma]

Response steps:
- 4-8 numbered steps following procedure

Decision points: [2-4 dilemmas with the legal reference]
Escalation conditions: [when to raise the alert level]
End state success: [criteria]
End state failure: [what went wrong]
Lessons learned: [2-4 points]
Variations: [alternative versions]
{gold_section}"#;

/// Repair header prepended to the Writer prompt in repair mode.
pub const WRITER_REPAIR_SECTION: &str = r#"Corrections required - earlier drafts were rejected
for the reasons below. The new scenarios must fix every one of them:
{critiques}

"#;

/// Seeds header inserted into the Writer prompt in fresh-batch mode.
pub const WRITER_SEEDS_SECTION: &str = r#"Selected scenario ideas (expand each into a full scenario):
{seeds}

"#;

/// System prompt for the Clerk (structured formatting).
pub const CLERK_SYSTEM_PROMPT: &str = r#"You are a conversion engine that turns free text into
structured data. You have no creativity, only precision.

Rules:
1. Input: raw scenario text.
2. Output: valid JSON only, shaped as {"scenarios": [...]}, one object per scenario with keys:
   title, category, threat_level, likelihood, complexity, location, background, steps,
   decision_points, escalation_conditions, end_state_success, end_state_failure,
   lessons_learned, variations.
3. If a field is missing, fill it with "" or []. Do not invent content that is not in the text.
4. Output nothing except the JSON.
"#;

/// Stricter retry instruction when the Clerk's first pass fails.
pub const CLERK_RETRY_PROMPT: &str = r#"Convert the following text into valid JSON shaped exactly
as {"scenarios": [...]}. Respond with the JSON object only - no explanations, no code fences.

{draft}"#;

/// System prompt for the Judge (quality adjudication).
pub const JUDGE_SYSTEM_PROMPT: &str = r#"You are the adjudicator of a transit-security training
program: the final authority on quality and safety. You have no feelings, only procedure.

Audit order:
1. Safety scan: any standoff breach or contact with a suspicious object -> score 0.
2. Legal scan: does the use of force match the threat? any profiling -> score 0.
3. Quality scan: is the narrative credible? are the steps coherent?

Always cite the specific doctrine rule behind every deduction. Reply with JSON only."#;

/// Scoring rubric presented to the Judge.
pub const JUDGE_RUBRIC: &str = r#"Scoring criteria (0-100):

1. Safety - weight 30%
   Pass: standoff distances kept, no contact with suspicious objects.
   Fail: contact with a suspicious object = immediate 0.

2. Legality - weight 30%
   Pass: reasonable force, justified fire, lawful detainment.
   Fail: fire without a life threat = immediate 0; profiling = immediate 0.

3. Tactics - weight 20%
   Pass: use of cover, closing with an active threat, teamwork.
   Fail: fleeing an active attack, charging a suspicious object.

4. Process - weight 20%
   Pass: procedure followed, correct reporting chain.
   Fail: procedure skipped, reporting chain broken.

Critical failures (immediate score 0):
- touching a suspicious object
- opening fire without a life threat
- profiling by ethnicity
- detainment without legal grounds"#;

/// User prompt for scenario evaluation. Expects a JSON reply:
/// `{"score": int, "critique": "...", "strengths": [...], "weaknesses": [...],
///   "repair_instructions": [{"field", "issue", "fix"}]}`.
pub const JUDGE_PROMPT: &str = r#"
{rubric}

Scenario under evaluation:
{scenario}

Review instructions:
1. Run the safety/legality/quality audit in order.
2. Score the scenario 0-100 against the criteria.
3. Name specific strengths and weaknesses, not generalities.
4. Any critical failure (safety/legality) -> score 0.

Repair instructions (this is what the writer receives):
If the score is below 80, provide exact, actionable corrections:
- What exactly must change? (name the field)
- Why is it a problem? (cite the doctrine or statute)
- How to fix it? (suggest a direction or phrasing)

Output format (JSON only):
{
  "score": 0,
  "critique": "overall summary of quality...",
  "strengths": ["specific strength 1", "specific strength 2"],
  "weaknesses": ["specific weakness 1", "specific weakness 2"],
  "repair_instructions": [
    {"field": "field to fix", "issue": "the problem", "fix": "suggested fix"}
  ]
}
"#;
