use crate::commands::{attributes, enums, values};

#[derive(Clone, Copy)]
pub struct ExampleGroup {
    pub title: &'static str,
    pub commands: &'static [&'static str],
}

#[derive(Clone, Copy)]
pub struct CommandExample {
    pub name: &'static str,
    pub groups: &'static [ExampleGroup],
}

pub fn command_examples() -> &'static [CommandExample] {
    &[
        CommandExample {
            name: "enums",
            groups: enums::EXAMPLES,
        },
        CommandExample {
            name: "attributes",
            groups: attributes::EXAMPLES,
        },
        CommandExample {
            name: "values",
            groups: values::EXAMPLES,
        },
    ]
}
