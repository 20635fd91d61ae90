//! The closed catalog of names recognized by both the type checker and the
//! interpreter. Signatures live in the prelude source; implementations live
//! in the interpreter crate.

/// Builtin declarations lexed ahead of every user program.
pub const PRELUDE: &str = include_str!("../../../std/prelude.bnt");

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Builtin {
    Insert,
    Remove,
    Replace,
    PushFront,
    PushBack,
    InsertInPlace,
    RemoveInPlace,
    ReplaceInPlace,
    Front,
    Back,
    Head,
    Tail,
    Combine,
    Append,
    Size,
    IsEmpty,
    Range,
    IntToChar,
    CharToInt,
    StringToCharList,
    CharListToString,
    PrintInt,
    PrintBool,
    PrintChar,
    PrintString,
    PrintList,
    Print2Tuple,
    Print3Tuple,
    Print4Tuple,
    ReadChar,
    ReadString,
    Halt,
}

impl Builtin {
    pub fn from_name(name: &str) -> Option<Builtin> {
        let builtin = match name {
            "insert" => Builtin::Insert,
            "remove" => Builtin::Remove,
            "replace" => Builtin::Replace,
            "pushFront" => Builtin::PushFront,
            "pushBack" => Builtin::PushBack,
            "insertInPlace" => Builtin::InsertInPlace,
            "removeInPlace" => Builtin::RemoveInPlace,
            "replaceInPlace" => Builtin::ReplaceInPlace,
            "front" => Builtin::Front,
            "back" => Builtin::Back,
            "head" => Builtin::Head,
            "tail" => Builtin::Tail,
            "combine" => Builtin::Combine,
            "append" => Builtin::Append,
            "size" => Builtin::Size,
            "isEmpty" => Builtin::IsEmpty,
            "range" => Builtin::Range,
            "intToChar" => Builtin::IntToChar,
            "charToInt" => Builtin::CharToInt,
            "stringToCharList" => Builtin::StringToCharList,
            "charListToString" => Builtin::CharListToString,
            "printInt" => Builtin::PrintInt,
            "printBool" => Builtin::PrintBool,
            "printChar" => Builtin::PrintChar,
            "printString" => Builtin::PrintString,
            "printList" => Builtin::PrintList,
            "print2Tuple" => Builtin::Print2Tuple,
            "print3Tuple" => Builtin::Print3Tuple,
            "print4Tuple" => Builtin::Print4Tuple,
            "readChar" => Builtin::ReadChar,
            "readString" => Builtin::ReadString,
            "halt" => Builtin::Halt,
            _ => return None,
        };
        Some(builtin)
    }

    pub fn name(self) -> &'static str {
        match self {
            Builtin::Insert => "insert",
            Builtin::Remove => "remove",
            Builtin::Replace => "replace",
            Builtin::PushFront => "pushFront",
            Builtin::PushBack => "pushBack",
            Builtin::InsertInPlace => "insertInPlace",
            Builtin::RemoveInPlace => "removeInPlace",
            Builtin::ReplaceInPlace => "replaceInPlace",
            Builtin::Front => "front",
            Builtin::Back => "back",
            Builtin::Head => "head",
            Builtin::Tail => "tail",
            Builtin::Combine => "combine",
            Builtin::Append => "append",
            Builtin::Size => "size",
            Builtin::IsEmpty => "isEmpty",
            Builtin::Range => "range",
            Builtin::IntToChar => "intToChar",
            Builtin::CharToInt => "charToInt",
            Builtin::StringToCharList => "stringToCharList",
            Builtin::CharListToString => "charListToString",
            Builtin::PrintInt => "printInt",
            Builtin::PrintBool => "printBool",
            Builtin::PrintChar => "printChar",
            Builtin::PrintString => "printString",
            Builtin::PrintList => "printList",
            Builtin::Print2Tuple => "print2Tuple",
            Builtin::Print3Tuple => "print3Tuple",
            Builtin::Print4Tuple => "print4Tuple",
            Builtin::ReadChar => "readChar",
            Builtin::ReadString => "readString",
            Builtin::Halt => "halt",
        }
    }
}
