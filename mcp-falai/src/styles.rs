//! Style policy table.
//!
//! Every style the `generate_image` tool advertises resolves to exactly one
//! [`StylePolicy`]: the seven core styles directly, and the named look-alike
//! styles (`ghibli-style`, `pixar-style`, ...) through their aliases.

/// Style used when the caller does not specify one.
pub const DEFAULT_STYLE: &str = "realistic";

/// Negative prompt and diffusion step count for a style.
#[derive(Debug, Clone, Copy)]
pub struct StylePolicy {
    /// Canonical style identifier
    pub id: &'static str,
    /// Advertised style names that share this policy
    pub aliases: &'static [&'static str],
    /// Attributes to steer away from, folded into the prompt
    pub negative_prompt: &'static str,
    /// Number of inference steps requested upstream
    pub inference_steps: u32,
}

const NOT_ILLUSTRATED: &str = "cartoon, anime, illustration, painting, drawing, art";
const NOT_PHOTOGRAPHIC: &str = "realistic, photograph, 3d";
const NOT_PHOTOGRAPHIC_ART: &str = "photograph, realistic, 3d";
const NOT_COLORED: &str = "color, realistic, photograph";

// =============================================================================
// Static Style Definitions
// =============================================================================

pub const REALISTIC: StylePolicy = StylePolicy {
    id: "realistic",
    aliases: &[],
    negative_prompt: NOT_ILLUSTRATED,
    inference_steps: 30,
};

pub const PHOTOGRAPHIC: StylePolicy = StylePolicy {
    id: "photographic",
    aliases: &[],
    negative_prompt: NOT_ILLUSTRATED,
    inference_steps: 30,
};

pub const ANIME: StylePolicy = StylePolicy {
    id: "anime",
    aliases: &[
        "ghibli-style",
        "pokemon-style",
        "genshin-impact-style",
        "one-piece-style",
        "attack-on-titan-style",
        "shinkai-makoto-style",
        "sailor-moon-style",
        "evangelion-style",
        "kyoto-animation-style",
        "kawaii-pastel-style",
        "dragon-ball-style",
        "demon-slayer-style",
        "toei-animation-style",
        "hayao-miyazaki-style",
        "makoto-shinkai-style",
        "katsuhiro-otomo-style",
        "mamoru-hosoda-style",
        "goro-miyazaki-style",
        "masaaki-yuasa-style",
        "shinichiro-ushijima-style",
        "naoko-yamada-style",
        "taichi-ishidate-style",
        "isao-takahata-style",
        "hiromasa-yonebayashi-style",
        "japanese-anime-style",
    ],
    negative_prompt: NOT_PHOTOGRAPHIC,
    inference_steps: 30,
};

pub const DIGITAL_ART: StylePolicy = StylePolicy {
    id: "digital-art",
    aliases: &["cyberpunk-style", "dark-fantasy-style"],
    negative_prompt: NOT_PHOTOGRAPHIC_ART,
    inference_steps: 30,
};

pub const CARTOON: StylePolicy = StylePolicy {
    id: "cartoon",
    aliases: &[
        "pixar-style",
        "pixar-art-style",
        "disney-princess-style",
        "dreamworks-animation-style",
        "marvel-studios-style",
        "dc-comics-style",
        "simpsons-style",
        "warner-bros-animation-style",
    ],
    negative_prompt: NOT_PHOTOGRAPHIC,
    inference_steps: 30,
};

/// Oil paintings need more diffusion steps to resolve brush texture.
pub const OIL_PAINTING: StylePolicy = StylePolicy {
    id: "oil-painting",
    aliases: &[],
    negative_prompt: NOT_PHOTOGRAPHIC_ART,
    inference_steps: 40,
};

pub const SKETCH: StylePolicy = StylePolicy {
    id: "sketch",
    aliases: &[],
    negative_prompt: NOT_COLORED,
    inference_steps: 30,
};

/// All style policies, core styles in their canonical order.
pub const STYLE_POLICIES: &[StylePolicy] = &[
    REALISTIC,
    ANIME,
    DIGITAL_ART,
    PHOTOGRAPHIC,
    CARTOON,
    OIL_PAINTING,
    SKETCH,
];

// =============================================================================
// Style Registry
// =============================================================================

/// Lookup over [`STYLE_POLICIES`].
pub struct StyleRegistry;

impl StyleRegistry {
    /// Resolve a style id or alias to its policy.
    ///
    /// Matching is exact; style names are lowercase kebab-case tokens.
    ///
    /// ```
    /// use mcp_falai::styles::StyleRegistry;
    ///
    /// assert_eq!(StyleRegistry::resolve("sketch").unwrap().inference_steps, 30);
    /// assert_eq!(StyleRegistry::resolve("ghibli-style").unwrap().id, "anime");
    /// assert!(StyleRegistry::resolve("vaporwave").is_none());
    /// ```
    pub fn resolve(name: &str) -> Option<&'static StylePolicy> {
        STYLE_POLICIES
            .iter()
            .find(|policy| policy.id == name || policy.aliases.contains(&name))
    }

    /// Negative prompt for a style, if the style is known.
    pub fn negative_prompt(name: &str) -> Option<&'static str> {
        Self::resolve(name).map(|p| p.negative_prompt)
    }

    /// Inference step count for a style, if the style is known.
    pub fn inference_steps(name: &str) -> Option<u32> {
        Self::resolve(name).map(|p| p.inference_steps)
    }

    /// Every style name accepted by the tool schema: core ids first, then aliases.
    pub fn advertised() -> Vec<&'static str> {
        let core = STYLE_POLICIES.iter().map(|p| p.id);
        let aliases = STYLE_POLICIES.iter().flat_map(|p| p.aliases.iter().copied());
        core.chain(aliases).collect()
    }
}

impl StylePolicy {
    /// Fold this style's negative cues into the prompt: `"<prompt>, <negative>"`.
    pub fn augment_prompt(&self, prompt: &str) -> String {
        format!("{}, {}", prompt, self.negative_prompt)
    }
}
