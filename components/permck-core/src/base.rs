use std::fmt;

bitflags::bitflags! {
    /// A base permission: a bitset over five independent rights.
    ///
    /// `r` (exclusive read) and `w` (exclusive write) do *not* imply their non-exclusive
    /// counterparts `R`/`W` — they are independent assertions, so e.g. `r` alone means
    /// "nobody else may read this, but I may not either" (a transient state produced mid-move,
    /// never written by a user-facing annotation).
    #[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Default)]
    pub struct Base: u8 {
        /// owned: the value may itself hold other owned values.
        const OWNED       = 0b00001;
        /// read.
        const READ        = 0b00010;
        /// write.
        const WRITE       = 0b00100;
        /// exclusive read: no other reference may read this location.
        const EXCL_READ   = 0b01000;
        /// exclusive write: no other reference may write this location.
        const EXCL_WRITE  = 0b10000;
    }
}

impl Base {
    pub const NONE: Base = Base::empty();
    /// `r` = {R}
    pub const SHARED_READ: Base = Base::READ;
    /// `v` = {R, w}
    pub const VALUE: Base = Base::READ.union(Base::EXCL_WRITE);
    /// `l` = {R, r, w}
    pub const LOCKED: Base = Base::READ.union(Base::EXCL_READ).union(Base::EXCL_WRITE);
    /// `m` = {R, W, r, w}
    pub const MUTABLE: Base = Base::READ
        .union(Base::WRITE)
        .union(Base::EXCL_READ)
        .union(Base::EXCL_WRITE);
    /// `a` = {O, R, W}
    pub const ANY: Base = Base::OWNED.union(Base::READ).union(Base::WRITE);

    /// A base permission is linear iff it combines an exclusive right with its
    /// non-exclusive counterpart: `{R, r} ⊆ P` or `{W, w} ⊆ P`.
    pub fn is_linear(self) -> bool {
        let read_pair = Base::READ | Base::EXCL_READ;
        let write_pair = Base::WRITE | Base::EXCL_WRITE;
        self.contains(read_pair) || self.contains(write_pair)
    }

    pub fn has_read(self) -> bool {
        self.contains(Base::READ)
    }

    pub fn has_owned(self) -> bool {
        self.contains(Base::OWNED)
    }

    /// `B \ A = ∅`, i.e. every right in `other` is already present in `self`.
    pub fn is_superset_of(self, other: Base) -> bool {
        other.difference(self).is_empty()
    }

    /// Strip linear-write `{W, w}` and exclusive-read `r` — used when a pointer target's
    /// base is demoted because linearity was lost at the pointer itself (see `convert`).
    pub fn strip_exclusive_after_demotion(self) -> Base {
        self - Base::WRITE - Base::EXCL_WRITE - Base::EXCL_READ
    }
}

impl fmt::Display for Base {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", print_base(*self))
    }
}

/// Canonical textual form: `o` first if present, then a shortcut letter if the remaining
/// flags exactly match one, else the remaining flags in `r w R W` order. `a` implies `o`
/// and prints alone.
pub fn print_base(base: Base) -> String {
    if base == Base::ANY {
        return "a".to_string();
    }

    let mut out = String::new();
    if base.has_owned() {
        out.push('o');
    }
    let rest = base - Base::OWNED;

    if rest.is_empty() {
        if out.is_empty() {
            out.push('n');
        }
        return out;
    }

    let shortcut = match rest {
        Base::SHARED_READ => Some('r'),
        Base::VALUE => Some('v'),
        Base::LOCKED => Some('l'),
        Base::MUTABLE => Some('m'),
        _ => None,
    };

    if let Some(c) = shortcut {
        out.push(c);
        return out;
    }

    if rest.contains(Base::EXCL_READ) {
        out.push('r');
    }
    if rest.contains(Base::EXCL_WRITE) {
        out.push('w');
    }
    if rest.contains(Base::READ) {
        out.push('R');
    }
    if rest.contains(Base::WRITE) {
        out.push('W');
    }
    out
}

pub fn parse_base_char(c: char) -> Option<Base> {
    Some(match c {
        'o' => Base::OWNED,
        'r' => Base::EXCL_READ,
        'w' => Base::EXCL_WRITE,
        'R' => Base::READ,
        'W' => Base::WRITE,
        'n' => Base::NONE,
        'm' => Base::MUTABLE,
        'l' => Base::LOCKED,
        'v' => Base::VALUE,
        'a' => Base::ANY,
        _ => return None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shortcuts_print_canonically() {
        assert_eq!(print_base(Base::NONE), "n");
        assert_eq!(print_base(Base::SHARED_READ), "r");
        assert_eq!(print_base(Base::VALUE), "v");
        assert_eq!(print_base(Base::LOCKED), "l");
        assert_eq!(print_base(Base::MUTABLE), "m");
        assert_eq!(print_base(Base::ANY), "a");
    }

    #[test]
    fn owned_mutable_prints_om() {
        assert_eq!(print_base(Base::OWNED | Base::MUTABLE), "om");
    }

    #[test]
    fn linearity() {
        assert!(!Base::SHARED_READ.is_linear());
        assert!(!Base::VALUE.is_linear());
        assert!(Base::LOCKED.is_linear());
        assert!(Base::MUTABLE.is_linear());
        assert!((Base::READ | Base::EXCL_READ).is_linear());
        assert!((Base::WRITE | Base::EXCL_WRITE).is_linear());
        assert!(!Base::ANY.is_linear());
    }
}
