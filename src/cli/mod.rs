// Command-line definitions: the clap parser and the value enums it uses.
pub mod cmd_enums;
pub mod type_enums;
