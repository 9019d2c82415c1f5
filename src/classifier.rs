//! Component type knowledge: keyword classification, type normalisation,
//! storage suggestions and specification templates.

use strsim::normalized_levenshtein;

/// Types whose value means "not identified"
pub const UNKNOWN_TYPE: &str = "unknown";

/// Minimum similarity for fuzzy type normalisation
const TYPE_SIMILARITY: f64 = 0.8;

/// A known component category
#[derive(Debug)]
pub struct Category {
    pub kind: &'static str,
    pub keywords: &'static [&'static str],
    /// Common values or part numbers, weaker evidence than keywords
    pub common_parts: &'static [&'static str],
    pub manufacturers: &'static [&'static str],
    pub description: &'static str,
    pub storage: &'static str,
}

pub const CATEGORIES: &[Category] = &[
    Category {
        kind: "resistor",
        keywords: &["resistor", "resistance", "ohm", "Ω"],
        common_parts: &["10k", "1k", "220", "330", "470", "1m"],
        manufacturers: &[],
        description: "Passive component that resists current flow",
        storage: "Passive Components - Resistors",
    },
    Category {
        kind: "capacitor",
        keywords: &["capacitor", "cap", "farad", "μf", "uf", "nf", "pf"],
        common_parts: &["100uf", "10uf", "1uf", "0.1uf", "100nf"],
        manufacturers: &[],
        description: "Passive component that stores electrical energy",
        storage: "Passive Components - Capacitors",
    },
    Category {
        kind: "arduino",
        keywords: &["arduino", "uno", "mega", "nano", "pro micro"],
        common_parts: &["uno r3", "mega 2560", "leonardo", "due"],
        manufacturers: &["arduino"],
        description: "Microcontroller development board",
        storage: "Development Boards",
    },
    Category {
        kind: "microcontroller",
        keywords: &["mcu", "microcontroller", "atmega", "stm32", "esp32", "esp8266", "pic"],
        common_parts: &[],
        manufacturers: &["atmel", "stmicroelectronics", "espressif", "microchip"],
        description: "Programmable integrated circuit",
        storage: "ICs - Microcontrollers",
    },
    Category {
        kind: "connector",
        keywords: &["connector", "header", "socket", "jst", "dupont", "usb"],
        common_parts: &["2.54mm", "rj45", "hdmi"],
        manufacturers: &[],
        description: "Interface for connecting components or wires",
        storage: "Connectors & Headers",
    },
    Category {
        kind: "ic",
        keywords: &["integrated circuit", "chip", "logic", "timer", "555", "7805"],
        common_parts: &["74hc", "ne555", "lm7805", "lm358"],
        manufacturers: &["texas instruments", "onsemi"],
        description: "Integrated circuit with multiple components",
        storage: "ICs - General",
    },
    Category {
        kind: "led",
        keywords: &["led", "light emitting diode"],
        common_parts: &["rgb", "5mm", "3mm"],
        manufacturers: &[],
        description: "Light emitting diode",
        storage: "Active Components - LEDs",
    },
    Category {
        kind: "transistor",
        keywords: &["transistor", "mosfet", "bjt", "2n2222", "bc547"],
        common_parts: &["2n3904", "irfz44n"],
        manufacturers: &[],
        description: "Semiconductor device for switching or amplification",
        storage: "Active Components - Transistors",
    },
    Category {
        kind: "diode",
        keywords: &["diode", "rectifier", "1n4007", "1n4148", "schottky"],
        common_parts: &["1n4001", "1n5819"],
        manufacturers: &[],
        description: "Semiconductor allowing current in one direction",
        storage: "Active Components - Diodes",
    },
    Category {
        kind: "sensor",
        keywords: &["sensor", "temperature", "humidity", "pressure", "motion", "dht", "bmp"],
        common_parts: &["dht11", "dht22", "bmp280", "mpu6050", "hc-sr04"],
        manufacturers: &[],
        description: "Device that detects and responds to environmental input",
        storage: "Sensors & Modules",
    },
    Category {
        kind: "display",
        keywords: &["display", "lcd", "oled", "tft", "screen", "7-segment"],
        common_parts: &[],
        manufacturers: &[],
        description: "Visual output device",
        storage: "Displays",
    },
    Category {
        kind: "module",
        keywords: &["module", "board", "breakout", "shield"],
        common_parts: &[],
        manufacturers: &[],
        description: "Pre-assembled circuit board module",
        storage: "Modules & Breakouts",
    },
    Category {
        kind: "switch",
        keywords: &["switch", "button", "pushbutton", "toggle"],
        common_parts: &[],
        manufacturers: &[],
        description: "Mechanical device for controlling electrical flow",
        storage: "Switches & Buttons",
    },
    Category {
        kind: "relay",
        keywords: &["relay", "solid state relay", "ssr"],
        common_parts: &[],
        manufacturers: &[],
        description: "Electrically operated switch",
        storage: "Relays & Switches",
    },
];

/// Alternative names models and users give to known types
const ALIASES: &[(&str, &str)] = &[
    ("mcu", "microcontroller"),
    ("integrated circuit", "ic"),
    ("chip", "ic"),
    ("voltage regulator", "ic"),
    ("mosfet", "transistor"),
    ("bjt", "transistor"),
    ("rectifier", "diode"),
    ("header", "connector"),
    ("pin header", "connector"),
    ("lcd", "display"),
    ("oled", "display"),
    ("breakout", "module"),
    ("breakout board", "module"),
    ("development board", "module"),
    ("button", "switch"),
    ("pushbutton", "switch"),
];

/// Look up a category by exact type name
pub fn category(kind: &str) -> Option<&'static Category> {
    let kind = kind.trim().to_lowercase();
    CATEGORIES.iter().find(|c| c.kind == kind)
}

/// Rank component types by keyword evidence in free text, best first
pub fn classify(text: &str) -> Vec<&'static str> {
    let text = text.to_lowercase();
    let mut scored: Vec<(&'static str, u32)> = CATEGORIES
        .iter()
        .filter_map(|category| {
            let hits = |words: &[&str], weight: u32| -> u32 {
                words.iter().filter(|w| text.contains(&w.to_lowercase())).count() as u32 * weight
            };
            let score = hits(category.keywords, 10)
                + hits(category.common_parts, 5)
                + hits(category.manufacturers, 3);
            (score > 0).then_some((category.kind, score))
        })
        .collect();

    // Stable sort keeps declaration order for equal scores
    scored.sort_by(|a, b| b.1.cmp(&a.1));
    scored.into_iter().map(|(kind, _)| kind).collect()
}

/// Map a free-form type name onto a known type where it clearly is one.
///
/// Exact names and aliases map directly, plurals and near misses are matched
/// by edit distance. Anything else is kept lowercased, and blank or null
/// values become `unknown`.
pub fn normalize_type(raw: &str) -> String {
    let kind = raw.trim().to_lowercase().replace('_', " ");
    if kind.is_empty() || kind == "null" || kind == "none" {
        return UNKNOWN_TYPE.to_string();
    }
    if category(&kind).is_some() {
        return kind;
    }
    if let Some((_, target)) = ALIASES.iter().find(|(alias, _)| *alias == kind) {
        return target.to_string();
    }
    if let Some(stem) = kind.strip_suffix('s') {
        if category(stem).is_some() {
            return stem.to_string();
        }
    }
    if kind.chars().count() >= 4 {
        let best = CATEGORIES
            .iter()
            .map(|c| (c.kind, normalized_levenshtein(&kind, c.kind)))
            .max_by(|a, b| a.1.total_cmp(&b.1));
        if let Some((target, similarity)) = best {
            if similarity >= TYPE_SIMILARITY {
                return target.to_string();
            }
        }
    }
    kind
}

/// Suggested storage area for a type
pub fn storage_location(kind: &str) -> &'static str {
    category(kind)
        .map(|c| c.storage)
        .unwrap_or("General Components")
}

/// Specification fields to fill in for a type, with example values
pub fn spec_template(kind: &str) -> &'static [(&'static str, &'static str)] {
    match kind.trim().to_lowercase().as_str() {
        "resistor" => &[
            ("resistance", "e.g., 10kΩ"),
            ("tolerance", "e.g., ±5%"),
            ("power_rating", "e.g., 0.25W"),
            ("package", "e.g., 0805, through-hole"),
        ],
        "capacitor" => &[
            ("capacitance", "e.g., 100uF"),
            ("voltage_rating", "e.g., 25V"),
            ("type", "e.g., electrolytic, ceramic"),
            ("package", "e.g., radial, SMD"),
        ],
        "arduino" => &[
            ("model", "e.g., Uno R3"),
            ("voltage", "e.g., 5V"),
            ("microcontroller", "e.g., ATmega328P"),
            ("digital_pins", "e.g., 14"),
            ("analog_pins", "e.g., 6"),
        ],
        "microcontroller" => &[
            ("model", "e.g., STM32F103"),
            ("architecture", "e.g., ARM Cortex-M3"),
            ("frequency", "e.g., 72MHz"),
            ("voltage", "e.g., 3.3V"),
            ("flash", "e.g., 64KB"),
            ("ram", "e.g., 20KB"),
        ],
        "connector" => &[
            ("type", "e.g., JST, pin header"),
            ("pins", "e.g., 10"),
            ("pitch", "e.g., 2.54mm"),
            ("mounting", "e.g., through-hole, SMD"),
        ],
        "led" => &[
            ("color", "e.g., Red, RGB"),
            ("forward_voltage", "e.g., 2.0V"),
            ("forward_current", "e.g., 20mA"),
            ("package", "e.g., 5mm, 0603 SMD"),
        ],
        _ => &[
            ("value", "Component value"),
            ("voltage", "Operating voltage"),
            ("package", "Package type"),
        ],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_ranks_by_keyword_score() {
        let ranked = classify("ATmega328P microcontroller by Atmel");
        assert_eq!(ranked.first(), Some(&"microcontroller"));

        let ranked = classify("10k ohm resistor");
        assert_eq!(ranked.first(), Some(&"resistor"));

        assert!(classify("qwerty").is_empty());
    }

    #[test]
    fn test_normalize_exact_and_alias() {
        assert_eq!(normalize_type("Resistor"), "resistor");
        assert_eq!(normalize_type(" MCU "), "microcontroller");
        assert_eq!(normalize_type("integrated_circuit"), "ic");
    }

    #[test]
    fn test_normalize_plurals_and_typos() {
        assert_eq!(normalize_type("LEDs"), "led");
        assert_eq!(normalize_type("capacitors"), "capacitor");
        assert_eq!(normalize_type("transistr"), "transistor");
    }

    #[test]
    fn test_normalize_keeps_unfamiliar_types() {
        assert_eq!(normalize_type("Potentiometer"), "potentiometer");
        assert_eq!(normalize_type("unknown"), "unknown");
        assert_eq!(normalize_type(""), "unknown");
        assert_eq!(normalize_type("null"), "unknown");
    }

    #[test]
    fn test_storage_location() {
        assert_eq!(storage_location("resistor"), "Passive Components - Resistors");
        assert_eq!(storage_location("Arduino"), "Development Boards");
        assert_eq!(storage_location("flux capacitor"), "General Components");
    }

    #[test]
    fn test_spec_template() {
        let fields: Vec<_> = spec_template("capacitor").iter().map(|(k, _)| *k).collect();
        assert_eq!(fields, vec!["capacitance", "voltage_rating", "type", "package"]);
        assert_eq!(spec_template("relay").len(), 3);
    }
}
