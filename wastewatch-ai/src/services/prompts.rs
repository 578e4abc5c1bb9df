//! Prompts for the two classifier stages

/// Stage A: is there improperly disposed waste in the picture at all?
pub const WASTE_GATE_PROMPT: &str = r#"Examine this image and decide whether it shows improperly disposed waste, garbage, trash or discarded material in the environment.

Classify as waste only when items are dumped or abandoned outdoors (streets, waterways, forests, vacant land), or are accumulated refuse in bins, landfills or dumps.
Do not classify as waste when items are in normal use, organized and clean, displayed for sale, properly stored, or part of an ordinary indoor setting.

Reply with a single JSON object:
{
  "contains_waste": true or false,
  "confidence": number from 0 to 100,
  "reasoning": "brief explanation",
  "short_description": "at most 8 words",
  "full_description": "2-3 sentences describing the image"
}"#;

/// Stage B: characterize the waste Stage A found
pub const DETAILED_ASSESSMENT_PROMPT: &str = r#"Analyze the waste shown in this image.

Weigh the quantity of waste, the hazard of the materials, proximity to water or other sensitive areas, proximity to homes, and how long the material will persist.

Reply with a single JSON object with these fields:
- waste_type: main type of waste (for example Plastic, Paper, Glass, Metal, Organic, Electronic, Construction, Mixed)
- severity_score: integer from 1 to 10, 10 being most severe
- priority_level: one of "low", "medium", "high", "critical"
- environmental_impact: short description of the environmental impact
- estimated_volume: estimated volume in cubic meters
- safety_concerns: safety concerns identified, if any
- analysis_notes: analysis and cleanup recommendations
- full_description: 2-3 sentences describing the waste scene

Keep the analysis focused and practical."#;
