//! The standard block catalog. Pure configuration data: every definition here
//! could equally come from a JSON file, and nothing in the engine depends on
//! this particular set of blocks.

use crate::schema::{
    BlockDefinition, Condition, ConditionValue, FieldDefinition, FieldType, FieldValue,
    PositionValue, SchemaRegistry, SectionDefinition,
};

fn field(
    id: &str,
    label: &str,
    field_type: FieldType,
    default_value: FieldValue,
) -> FieldDefinition {
    FieldDefinition {
        id: id.to_string(),
        label: label.to_string(),
        field_type,
        default_value,
        options: Vec::new(),
        min: None,
        max: None,
        suggestions: Vec::new(),
        max_items: None,
    }
}

fn select(id: &str, label: &str, options: &[&str], default: &str) -> FieldDefinition {
    FieldDefinition {
        options: options.iter().map(|s| s.to_string()).collect(),
        ..field(id, label, FieldType::Select, FieldValue::text(default))
    }
}

fn slider(id: &str, label: &str, min: f64, max: f64, default: f64) -> FieldDefinition {
    FieldDefinition {
        min: Some(min),
        max: Some(max),
        ..field(id, label, FieldType::Slider, FieldValue::Number(default))
    }
}

fn text(id: &str, label: &str) -> FieldDefinition {
    field(id, label, FieldType::Text, FieldValue::text(""))
}

fn tags(id: &str, label: &str, max_items: usize) -> FieldDefinition {
    FieldDefinition {
        max_items: Some(max_items),
        ..field(id, label, FieldType::Tags, FieldValue::Tags(Vec::new()))
    }
}

fn section(id: &str, label: &str, fields: Vec<FieldDefinition>) -> SectionDefinition {
    SectionDefinition {
        id: id.to_string(),
        label: label.to_string(),
        toggleable: false,
        condition: None,
        fields,
    }
}

fn subject() -> BlockDefinition {
    BlockDefinition {
        block_type: "Subject".to_string(),
        label: "Subject".to_string(),
        single_active_instance: true,
        sections: vec![
            section(
                "identity",
                "Identity",
                vec![
                    select(
                        "category",
                        "Category",
                        &["Human", "Animal", "Creature", "Object"],
                        "Human",
                    ),
                    text("role", "Role"),
                    text("description", "Description"),
                ],
            ),
            section(
                "appearance",
                "Appearance",
                vec![
                    text("outfit", "Outfit"),
                    FieldDefinition {
                        max_items: Some(6),
                        ..field(
                            "props",
                            "Props",
                            FieldType::DetailedList,
                            FieldValue::Items(Vec::new()),
                        )
                    },
                    slider("size", "Size in frame", 0.0, 100.0, 50.0),
                    field(
                        "position",
                        "Position",
                        FieldType::PositionPicker,
                        FieldValue::Position(PositionValue { x: 50.0, y: 50.0 }),
                    ),
                ],
            ),
            SectionDefinition {
                toggleable: true,
                ..section(
                    "interactions",
                    "Interactions",
                    vec![text("target", "Interacts with"), text("verb", "Interaction")],
                )
            },
        ],
    }
}

fn background() -> BlockDefinition {
    BlockDefinition {
        block_type: "Background".to_string(),
        label: "Background & Atmosphere".to_string(),
        single_active_instance: true,
        sections: vec![
            section(
                "setting",
                "Setting",
                vec![
                    select(
                        "type",
                        "Type",
                        &["Outdoor", "Indoor", "Studio", "Abstract"],
                        "Outdoor",
                    ),
                    text("environment", "Environment"),
                ],
            ),
            SectionDefinition {
                condition: Some(Condition {
                    block_type: None,
                    section_id: "setting".to_string(),
                    field_id: "type".to_string(),
                    value: ConditionValue::Scalar(FieldValue::text("Outdoor")),
                }),
                ..section(
                    "weather",
                    "Weather",
                    vec![
                        select(
                            "conditions",
                            "Conditions",
                            &["None", "Rain", "Snow", "Fog", "Storm"],
                            "None",
                        ),
                        select(
                            "time_of_day",
                            "Time of day",
                            &["None", "Dawn", "Midday", "Dusk", "Night"],
                            "None",
                        ),
                    ],
                )
            },
            SectionDefinition {
                toggleable: true,
                ..section(
                    "transparency",
                    "Transparency",
                    vec![field(
                        "remove_bg",
                        "Remove background",
                        FieldType::Checkbox,
                        FieldValue::Bool(false),
                    )],
                )
            },
        ],
    }
}

fn camera() -> BlockDefinition {
    BlockDefinition {
        block_type: "Camera".to_string(),
        label: "Camera & Framing".to_string(),
        single_active_instance: true,
        sections: vec![
            section(
                "framing",
                "Framing",
                vec![
                    select(
                        "shot_size",
                        "Shot size",
                        &[
                            "None",
                            "Extreme Close-up",
                            "Close-up",
                            "Medium Shot",
                            "Full Shot",
                            "Wide Shot",
                        ],
                        "None",
                    ),
                    select(
                        "angle",
                        "Angle",
                        &["None", "Eye Level", "Low Angle", "High Angle", "Overhead"],
                        "None",
                    ),
                    slider("distance", "Subject distance", 0.0, 100.0, 50.0),
                ],
            ),
            // Lens tuning only applies when a living subject is in frame;
            // cross-block condition against the active Subject.
            SectionDefinition {
                condition: Some(Condition {
                    block_type: Some("Subject".to_string()),
                    section_id: "identity".to_string(),
                    field_id: "category".to_string(),
                    value: ConditionValue::AnyOf(vec![
                        FieldValue::text("Human"),
                        FieldValue::text("Creature"),
                    ]),
                }),
                ..section(
                    "portrait",
                    "Portrait lens",
                    vec![
                        select(
                            "lens",
                            "Lens",
                            &["None", "35mm", "50mm", "85mm", "135mm"],
                            "None",
                        ),
                        slider("bokeh", "Background blur", 0.0, 100.0, 0.0),
                    ],
                )
            },
        ],
    }
}

fn lighting() -> BlockDefinition {
    BlockDefinition {
        block_type: "Lighting".to_string(),
        label: "Lighting".to_string(),
        single_active_instance: false,
        sections: vec![section(
            "light",
            "Light",
            vec![
                select(
                    "style",
                    "Style",
                    &[
                        "None",
                        "Natural",
                        "Golden Hour",
                        "Neon",
                        "Candlelight",
                        "Hard Studio",
                    ],
                    "None",
                ),
                slider("intensity", "Intensity", 0.0, 100.0, 50.0),
                tags("accents", "Accent lights", 4),
            ],
        )],
    }
}

fn effects() -> BlockDefinition {
    BlockDefinition {
        block_type: "Effects".to_string(),
        label: "Effects".to_string(),
        single_active_instance: false,
        sections: vec![section(
            "effects",
            "Effects",
            vec![
                tags("elements", "Elements", 8),
                slider("intensity", "Intensity", 0.0, 100.0, 50.0),
            ],
        )],
    }
}

fn style() -> BlockDefinition {
    BlockDefinition {
        block_type: "Style".to_string(),
        label: "Style".to_string(),
        single_active_instance: true,
        sections: vec![section(
            "style",
            "Style",
            vec![
                select(
                    "medium",
                    "Medium",
                    &[
                        "None",
                        "Photorealistic",
                        "Oil Painting",
                        "Watercolor",
                        "3D Render",
                        "Ink Sketch",
                    ],
                    "None",
                ),
                tags("influences", "Influences", 5),
                field(
                    "palette",
                    "Palette accent",
                    FieldType::Color,
                    FieldValue::text(""),
                ),
            ],
        )],
    }
}

fn post_processing() -> BlockDefinition {
    BlockDefinition {
        block_type: "PostProcessing".to_string(),
        label: "Post-processing".to_string(),
        single_active_instance: false,
        sections: vec![section(
            "finish",
            "Finish",
            vec![
                select(
                    "grade",
                    "Color grade",
                    &["None", "Warm", "Cool", "High Contrast", "Faded Film"],
                    "None",
                ),
                slider("grain", "Film grain", 0.0, 100.0, 0.0),
            ],
        )],
    }
}

fn mood() -> BlockDefinition {
    BlockDefinition {
        block_type: "Mood".to_string(),
        label: "Mood".to_string(),
        single_active_instance: false,
        sections: vec![section(
            "mood",
            "Mood",
            vec![text("atmosphere", "Atmosphere"), tags("keywords", "Keywords", 6)],
        )],
    }
}

/// Build the default schema registry. Definitions are validated on load.
pub fn default_registry() -> crate::error::MuralResult<SchemaRegistry> {
    SchemaRegistry::from_definitions(vec![
        subject(),
        background(),
        camera(),
        lighting(),
        effects(),
        style(),
        post_processing(),
        mood(),
    ])
}
