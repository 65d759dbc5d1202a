// src/services/prompt_builder.rs
use crate::models::{ColorProfile, DefectType, ElementInventory, RestorationRequest};

/// One imperative line per defect type, in directive order.
pub const DEFECT_DIRECTIVES: [(DefectType, &str); 6] = [
    (
        DefectType::Scratches,
        "Remove all scratches and surface abrasions completely",
    ),
    (
        DefectType::DustSpots,
        "Remove dust spots, speckles, and small imperfections",
    ),
    (
        DefectType::FadedColors,
        "Restore faded colors to their original vibrancy",
    ),
    (
        DefectType::NoiseGrain,
        "Reduce noise and grain while preserving details",
    ),
    (
        DefectType::TearsFolds,
        "Repair tears, folds, and creases seamlessly",
    ),
    (
        DefectType::WaterDamage,
        "Fix water damage, stains, and discoloration",
    ),
];

pub const COLOR_ENHANCEMENT_DIRECTIVE: &str =
    "Enhance overall color balance and saturation naturally";

/// Invariants every restoration must respect. Order and wording matter.
pub const RESTORATION_RULES: [&str; 10] = [
    "DO NOT add ANY new elements that were not in the original image (no new people, objects, or background elements)",
    "DO NOT change facial features, expressions, or positions of people",
    "DO NOT alter the composition, framing, or perspective",
    "DO NOT add decorative elements, text, or symbols not in original",
    "DO NOT change the number of people or objects",
    "Preserve all original textures, patterns, and details",
    "Maintain historical accuracy and authenticity",
    "Only repair defects and restore original colors/tones - do not \"beautify\" or stylize beyond restoration",
    "Keep exact same framing and crop",
    "Return ONLY the restored image data - no text or annotations",
];

const RESTORATION_HEADER: &str = "You are a professional photo restoration expert. Restore this image with the following requirements:\n\n";

const ANALYSIS_PROMPT: &str = r#"
You are a professional photo restoration expert. Analyze this image comprehensively to identify defects AND catalog all elements present.

CRITICAL: This analysis will be used to validate that restoration does NOT add any new elements. Be thorough and precise.

Return a JSON object with this exact structure:
{
  "defects": [
    {
      "type": "SCRATCHES|DUST_SPOTS|FADED_COLORS|NOISE_GRAIN|TEARS_FOLDS|WATER_DAMAGE",
      "severity": "LOW|MEDIUM|HIGH",
      "description": "Description of the defect and where it appears",
      "estimatedFixTime": "QUICK|MODERATE|COMPLEX"
    }
  ],
  "overallCondition": "POOR|FAIR|GOOD|EXCELLENT",
  "recommendations": ["array", "of", "recommendations"],
  "colorAnalysis": {
    "saturationLevel": "LOW|NORMAL|HIGH",
    "contrastLevel": "LOW|NORMAL|HIGH",
    "whiteBalance": "COOL|NEUTRAL|WARM",
    "colorCast": "NONE|BLUE|YELLOW|RED|GREEN"
  },
  "elementInventory": {
    "people": [
      {
        "count": 1,
        "description": "Brief description of person(s) - age, gender, position, clothing if visible",
        "facialFeatures": "Description of visible facial features, expressions, hair"
      }
    ],
    "objects": [
      {
        "type": "Object type (e.g., furniture, vehicle, building)",
        "description": "Detailed description including color, size, position",
        "count": 1
      }
    ],
    "backgroundElements": [
      {
        "type": "Background element type (e.g., sky, wall, landscape)",
        "description": "Description of background features",
        "prominentFeatures": ["list", "of", "key", "features"]
      }
    ],
    "composition": {
      "framing": "Description of how image is framed/cropped",
      "perspective": "Description of camera angle/perspective",
      "keyElements": ["list", "of", "most", "prominent", "elements"]
    }
  }
}

IMPORTANT RULES:
- Only include defect types that are actually present in the image
- Be extremely detailed in elementInventory - this is critical for validation
- List ALL visible people, objects, and background elements
- Note specific details like clothing colors, object positions, facial expressions
- Be precise and factual in your analysis
- The elementInventory will be used to ensure restoration doesn't add anything new
"#;

const VALIDATION_PROMPT: &str = r#"
You are a professional image validation expert. Compare these two images:
- Image 1: Original
- Image 2: Restored

Goal: validate "what a human perceives" when comparing the images.
Restoration WILL change pixels; ignore pixel-level differences. Focus only on perceptual/semantic content.

CRITICAL: The restored image must NOT introduce new elements or new details that weren't present.
Examples of unacceptable additions/changes:
- Adding a new button to clothing
- Adding nail polish / changing nail color
- Adding jewelry, logos, patterns, text, symbols
- Adding new objects in background (birds, trees, signs, etc.)

Allowed restoration changes:
- Removing scratches/dust/tears/water stains
- Denoising
- Color correction / contrast improvements
These should NOT be flagged as "added elements".

Return a JSON object with this exact structure:
{
  "hasAddedElements": "YES/NO",
  "hasRemovedElements": "YES/NO",
  "hasAlteredFaces": "YES/NO",
  "hasChangedComposition": "YES/NO",
  "fidelityScore": 0-100,
  "elementComparison": {
    "peopleCount": { "original": 0, "restored": 0, "match": true },
    "objectsCount": { "original": 0, "restored": 0, "match": true },
    "addedElements": ["human-noticeable new elements/details"],
    "removedElements": ["human-noticeable missing elements/details"],
    "alteredElements": ["human-noticeable changes (NOT defect removal), e.g., added button, changed nail color"]
  },
  "fineGrainedAttributeChanges": [
    {
      "area": "hands|nails|clothing|face|hair|background|other",
      "change": "short description of change",
      "severity": "LOW|MEDIUM|HIGH"
    }
  ],
  "issuesFound": ["list of issues"],
  "validationPassed": "YES/NO"
}

Rules:
- If you detect ANY added element or added detail (even small, like nail paint or a button), set hasAddedElements="YES" and validationPassed="NO".
- If you detect missing elements, set hasRemovedElements="YES" and validationPassed="NO".
- If composition changed (crop/rotation/perspective), validationPassed="NO".
- If faces were altered (features/expression/shape), validationPassed="NO".
- Be strict, but do NOT confuse defect removal/color correction with added elements.
"#;

/// Inputs for each stage's instruction.
#[derive(Debug, Clone, Copy)]
pub enum PromptContext<'a> {
    Analyze,
    Restore(&'a RestorationRequest),
    Validate {
        inventory: Option<&'a ElementInventory>,
    },
}

pub fn build(context: PromptContext<'_>) -> String {
    match context {
        PromptContext::Analyze => analysis_prompt().to_string(),
        PromptContext::Restore(request) => restoration_prompt(request),
        PromptContext::Validate { inventory } => validation_prompt(inventory),
    }
}

pub fn analysis_prompt() -> &'static str {
    ANALYSIS_PROMPT
}

pub fn restoration_prompt(request: &RestorationRequest) -> String {
    let mut prompt = String::from(RESTORATION_HEADER);

    let selected = request.effective_defects();
    for (defect, directive) in DEFECT_DIRECTIVES {
        if selected.contains(&defect) {
            prompt.push_str(&format!("- {}\n", directive));
        }
    }

    if request.enhance_colors {
        prompt.push_str(&format!("- {}\n", COLOR_ENHANCEMENT_DIRECTIVE));
    }

    let analysis = request.analysis.as_ref();

    if let Some(inventory) = analysis.and_then(|a| a.element_inventory.as_ref()) {
        prompt.push_str(&inventory_block(inventory));
    }

    match analysis.and_then(|a| a.color_analysis.as_ref()) {
        Some(profile) => prompt.push_str(&color_targets_block(profile)),
        None if request.enhance_colors => prompt.push_str(GENERIC_COLOR_BLOCK),
        None => {}
    }

    prompt.push_str(&rules_block());
    prompt
}

pub fn validation_prompt(inventory: Option<&ElementInventory>) -> String {
    let mut prompt = String::from(VALIDATION_PROMPT);

    if let Some(inventory) = inventory {
        prompt.push_str(
            "\n\nELEMENT INVENTORY FROM ORIGINAL ANALYSIS - VERIFY ALL ARE PRESENT:\n",
        );
        prompt.push_str(&serde_json::to_string_pretty(inventory).unwrap_or_default());
        prompt.push_str(
            "\n\nCompare the restored image against this inventory. All elements listed above must be present, and NO new elements should exist.",
        );
    }

    prompt
}

fn inventory_block(inventory: &ElementInventory) -> String {
    let mut block = String::from("\n\nELEMENT INVENTORY - PRESERVE EXACTLY THESE ELEMENTS:\n");

    if !inventory.people.is_empty() {
        block.push_str(&format!("People present: {}\n", to_json(&inventory.people)));
    }
    if !inventory.objects.is_empty() {
        block.push_str(&format!("Objects present: {}\n", to_json(&inventory.objects)));
    }
    if !inventory.background_elements.is_empty() {
        block.push_str(&format!(
            "Background elements: {}\n",
            to_json(&inventory.background_elements)
        ));
    }
    if let Some(composition) = &inventory.composition {
        block.push_str(&format!("Composition: {}\n", to_json(composition)));
    }

    block
}

fn color_targets_block(profile: &ColorProfile) -> String {
    format!(
        "\n\nCOLOR RESTORATION TARGETS (from analysis):\n\
         - saturationLevel: {}\n\
         - contrastLevel: {}\n\
         - whiteBalance: {}\n\
         - colorCast: {}\n\
         \nCOLOR RESTORATION INSTRUCTIONS:\n\
         - Restore faded colors to look natural and historically accurate (avoid oversaturation)\n\
         - Correct any color cast while keeping skin tones and fabric colors believable\n\
         - Improve contrast gently to recover detail (avoid HDR/over-sharpened look)\n\
         - Do NOT introduce new colors/patterns/details that weren't present (e.g., no new nail polish, no new clothing buttons)\n",
        profile.saturation_level,
        profile.contrast_level,
        profile.white_balance,
        profile.color_cast,
    )
}

const GENERIC_COLOR_BLOCK: &str = "\n\nCOLOR RESTORATION INSTRUCTIONS:\n\
- Restore and rebalance colors naturally (avoid oversaturation)\n\
- Maintain realistic skin tones and original material colors\n\
- Do NOT introduce new colors/patterns/details that weren't present\n";

fn rules_block() -> String {
    let mut block = String::from(
        "\n\nCRITICAL RESTORATION RULES - VIOLATION OF THESE WILL CAUSE VALIDATION FAILURE:\n",
    );
    for (index, rule) in RESTORATION_RULES.iter().enumerate() {
        block.push_str(&format!("{}. {}\n", index + 1, rule));
    }
    block.push_str(
        "\nREMEMBER: This restoration will be validated against the original. Any added elements will be detected and cause failure.\n",
    );
    block
}

fn to_json<T: serde::Serialize + ?Sized>(value: &T) -> String {
    serde_json::to_string(value).unwrap_or_default()
}
