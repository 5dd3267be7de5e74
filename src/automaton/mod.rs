/*!
Automata that filter the keys visited by a stream.

A stream built with `Map::search` or `Fst::search` only visits keys accepted
by the given automaton. The traversal asks `can_match` before descending into
a node, so an automaton that knows early that nothing below can match prunes
whole subtrees.

This module ships the matchers a tag index needs (exact keys, prefixes and
`*`/`?` wildcard patterns) plus combinators to join them.
*/

/// Automaton describes types that behave as a finite automaton.
///
/// All implementors of this trait are *byte based*: every transition
/// consumes exactly one byte of the key. Keys in this crate are bytes, so
/// an automaton over UTF-8 text must do any decoding itself.
pub trait Automaton {
    /// The type of the state used in the automaton.
    type State;

    /// Returns a single start state for this automaton.
    ///
    /// This method should always return the same value for each
    /// implementation.
    fn start(&self) -> Self::State;

    /// Returns true if and only if `state` is a match state.
    fn is_match(&self, state: &Self::State) -> bool;

    /// Returns true if and only if `state` can lead to a match in zero or more
    /// steps.
    ///
    /// Returning `false` when a match is still reachable makes streams skip
    /// keys. Returning `true` when no match is reachable is always correct,
    /// only slower.
    fn can_match(&self, _state: &Self::State) -> bool {
        true
    }

    /// Returns true if and only if `state` matches and must match no matter
    /// what steps are taken.
    ///
    /// Returning `false` when every continuation matches is always correct,
    /// only slower.
    fn will_always_match(&self, _state: &Self::State) -> bool {
        false
    }

    /// Return the next state given `state` and an input.
    fn accept(&self, state: &Self::State, byte: u8) -> Self::State;

    /// If applicable, return the next state when the end of a key is seen.
    ///
    /// Streams consult this whenever they reach a final node. If it returns
    /// a state, that state decides whether the key matches.
    fn accept_eof(&self, _: &Self::State) -> Option<Self::State> {
        None
    }

    /// Returns an automaton that matches the strings that start with something
    /// this automaton matches.
    fn starts_with(self) -> StartsWith<Self>
    where
        Self: Sized,
    {
        StartsWith(self)
    }

    /// Returns an automaton that matches the strings matched by either this or
    /// the other automaton.
    fn union<Rhs: Automaton>(self, rhs: Rhs) -> Union<Self, Rhs>
    where
        Self: Sized,
    {
        Union(self, rhs)
    }

    /// Returns an automaton that matches the strings matched by both this and
    /// the other automaton.
    fn intersection<Rhs: Automaton>(self, rhs: Rhs) -> Intersection<Self, Rhs>
    where
        Self: Sized,
    {
        Intersection(self, rhs)
    }

    /// Returns an automaton that matches the strings not matched by this
    /// automaton.
    fn complement(self) -> Complement<Self>
    where
        Self: Sized,
    {
        Complement(self)
    }
}

impl<'a, T: Automaton> Automaton for &'a T {
    type State = T::State;

    fn start(&self) -> T::State {
        (*self).start()
    }

    fn is_match(&self, state: &T::State) -> bool {
        (*self).is_match(state)
    }

    fn can_match(&self, state: &T::State) -> bool {
        (*self).can_match(state)
    }

    fn will_always_match(&self, state: &T::State) -> bool {
        (*self).will_always_match(state)
    }

    fn accept(&self, state: &T::State, byte: u8) -> T::State {
        (*self).accept(state, byte)
    }

    fn accept_eof(&self, state: &T::State) -> Option<T::State> {
        (*self).accept_eof(state)
    }
}

/// An automaton that always matches.
///
/// This is useful in a generic context as a way to express that no automaton
/// should be used.
#[derive(Clone, Copy, Debug)]
pub struct AlwaysMatch;

impl Automaton for AlwaysMatch {
    type State = ();

    #[inline]
    fn start(&self) {}

    #[inline]
    fn is_match(&self, _: &()) -> bool {
        true
    }

    #[inline]
    fn can_match(&self, _: &()) -> bool {
        true
    }

    #[inline]
    fn will_always_match(&self, _: &()) -> bool {
        true
    }

    #[inline]
    fn accept(&self, _: &(), _: u8) {}
}

/// An automaton that matches one exact key.
///
/// Combined with [`StartsWith`], it finds every key with a given prefix,
/// which is how a tag index lists the values of one tag:
///
/// ```rust
/// use index_fst::{Automaton, IntoStreamer, Map};
/// use index_fst::automaton::Str;
///
/// # fn main() { example().unwrap(); }
/// fn example() -> Result<(), Box<dyn std::error::Error>> {
///     let map = Map::from_iter(vec![
///         ("dc=east", 1), ("dc=west", 2), ("os=linux", 3),
///     ])?;
///
///     let stream = map.search(Str::new("dc=").starts_with()).into_stream();
///     assert_eq!(stream.into_str_keys()?, vec!["dc=east", "dc=west"]);
///     Ok(())
/// }
/// ```
#[derive(Clone, Debug)]
pub struct Str<'a> {
    string: &'a [u8],
}

impl<'a> Str<'a> {
    /// Constructs an automaton that matches an exact string.
    #[inline]
    pub fn new(string: &'a str) -> Str<'a> {
        Str { string: string.as_bytes() }
    }

    /// Constructs an automaton that matches an exact byte string.
    #[inline]
    pub fn from_bytes(string: &'a [u8]) -> Str<'a> {
        Str { string }
    }
}

impl<'a> Automaton for Str<'a> {
    /// The number of bytes matched so far, or `None` once the input has
    /// diverged.
    type State = Option<usize>;

    #[inline]
    fn start(&self) -> Option<usize> {
        Some(0)
    }

    #[inline]
    fn is_match(&self, pos: &Option<usize>) -> bool {
        *pos == Some(self.string.len())
    }

    #[inline]
    fn can_match(&self, pos: &Option<usize>) -> bool {
        pos.is_some()
    }

    #[inline]
    fn accept(&self, pos: &Option<usize>, byte: u8) -> Option<usize> {
        match *pos {
            Some(pos) if self.string.get(pos) == Some(&byte) => Some(pos + 1),
            _ => None,
        }
    }
}

/// An automaton that matches if the input contains a specific subsequence.
///
/// The bytes of the subsequence must appear in order, but not necessarily
/// next to each other. `Subsequence::new("dcw")` matches `dc=west`.
#[derive(Clone, Debug)]
pub struct Subsequence<'a> {
    subseq: &'a [u8],
}

impl<'a> Subsequence<'a> {
    /// Constructs an automaton that matches input containing the
    /// specified subsequence.
    #[inline]
    pub fn new(subsequence: &'a str) -> Subsequence<'a> {
        Subsequence { subseq: subsequence.as_bytes() }
    }
}

impl<'a> Automaton for Subsequence<'a> {
    type State = usize;

    #[inline]
    fn start(&self) -> usize {
        0
    }

    #[inline]
    fn is_match(&self, &state: &usize) -> bool {
        state == self.subseq.len()
    }

    #[inline]
    fn will_always_match(&self, &state: &usize) -> bool {
        state == self.subseq.len()
    }

    #[inline]
    fn accept(&self, &state: &usize, byte: u8) -> usize {
        if state == self.subseq.len() {
            state
        } else if byte == self.subseq[state] {
            state + 1
        } else {
            state
        }
    }
}

/// An automaton for shell style wildcard patterns.
///
/// `*` matches any run of bytes, including none, and `?` matches exactly one
/// byte. Every other byte matches itself. The whole key must match the
/// pattern, so `host=web-*` finds every `host` tag whose value starts with
/// `web-`.
///
/// ```rust
/// use index_fst::{IntoStreamer, Map};
/// use index_fst::automaton::Wildcard;
///
/// # fn main() { example().unwrap(); }
/// fn example() -> Result<(), Box<dyn std::error::Error>> {
///     let map = Map::from_iter(vec![
///         ("host=db-01", 1), ("host=web-01", 2), ("host=web-02", 3),
///     ])?;
///
///     let stream = map.search(Wildcard::new("host=web-0?")).into_stream();
///     assert_eq!(stream.into_values(), vec![2, 3]);
///     Ok(())
/// }
/// ```
#[derive(Clone, Debug)]
pub struct Wildcard<'a> {
    pattern: &'a [u8],
}

/// The `Automaton` state for `Wildcard`.
///
/// Position `i` is set when the input so far can be matched by the first
/// `i` bytes of the pattern.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct WildcardState(Vec<bool>);

impl<'a> Wildcard<'a> {
    /// Constructs an automaton for the given wildcard pattern.
    #[inline]
    pub fn new(pattern: &'a str) -> Wildcard<'a> {
        Wildcard { pattern: pattern.as_bytes() }
    }

    /// Marks every position reachable from a set position by letting a `*`
    /// match nothing.
    fn close(&self, set: &mut [bool]) {
        for i in 0..self.pattern.len() {
            if set[i] && self.pattern[i] == b'*' {
                set[i + 1] = true;
            }
        }
    }
}

impl<'a> Automaton for Wildcard<'a> {
    type State = WildcardState;

    fn start(&self) -> WildcardState {
        let mut set = vec![false; self.pattern.len() + 1];
        set[0] = true;
        self.close(&mut set);
        WildcardState(set)
    }

    fn is_match(&self, state: &WildcardState) -> bool {
        state.0[self.pattern.len()]
    }

    fn can_match(&self, state: &WildcardState) -> bool {
        state.0.iter().any(|&on| on)
    }

    fn will_always_match(&self, state: &WildcardState) -> bool {
        (0..self.pattern.len()).any(|i| {
            state.0[i] && self.pattern[i..].iter().all(|&b| b == b'*')
        })
    }

    fn accept(&self, state: &WildcardState, byte: u8) -> WildcardState {
        let mut next = vec![false; self.pattern.len() + 1];
        for (i, &p) in self.pattern.iter().enumerate() {
            if !state.0[i] {
                continue;
            }
            match p {
                b'*' => next[i] = true,
                b'?' => next[i + 1] = true,
                p if p == byte => next[i + 1] = true,
                _ => {}
            }
        }
        self.close(&mut next);
        WildcardState(next)
    }
}

/// An automaton that matches a string that begins with something that the
/// wrapped automaton matches.
#[derive(Clone, Debug)]
pub struct StartsWith<A>(A);

/// The `Automaton` state for `StartsWith<A>`.
pub struct StartsWithState<A: Automaton>(StartsWithStateKind<A>);

enum StartsWithStateKind<A: Automaton> {
    Done,
    Running(A::State),
}

impl<A: Automaton> StartsWith<A> {
    fn step(&self, inner: A::State) -> StartsWithState<A> {
        if self.0.is_match(&inner) {
            StartsWithState(StartsWithStateKind::Done)
        } else {
            StartsWithState(StartsWithStateKind::Running(inner))
        }
    }
}

impl<A: Automaton> Automaton for StartsWith<A> {
    type State = StartsWithState<A>;

    fn start(&self) -> StartsWithState<A> {
        self.step(self.0.start())
    }

    fn is_match(&self, state: &StartsWithState<A>) -> bool {
        match state.0 {
            StartsWithStateKind::Done => true,
            StartsWithStateKind::Running(_) => false,
        }
    }

    fn can_match(&self, state: &StartsWithState<A>) -> bool {
        match state.0 {
            StartsWithStateKind::Done => true,
            StartsWithStateKind::Running(ref inner) => self.0.can_match(inner),
        }
    }

    fn will_always_match(&self, state: &StartsWithState<A>) -> bool {
        self.is_match(state)
    }

    fn accept(
        &self,
        state: &StartsWithState<A>,
        byte: u8,
    ) -> StartsWithState<A> {
        match state.0 {
            StartsWithStateKind::Done => {
                StartsWithState(StartsWithStateKind::Done)
            }
            StartsWithStateKind::Running(ref inner) => {
                self.step(self.0.accept(inner, byte))
            }
        }
    }
}

impl<A: Automaton> Clone for StartsWithState<A>
where
    A::State: Clone,
{
    fn clone(&self) -> StartsWithState<A> {
        StartsWithState(match self.0 {
            StartsWithStateKind::Done => StartsWithStateKind::Done,
            StartsWithStateKind::Running(ref inner) => {
                StartsWithStateKind::Running(inner.clone())
            }
        })
    }
}

/// An automaton that matches when one of its component automata match.
#[derive(Clone, Debug)]
pub struct Union<A, B>(A, B);

/// The `Automaton` state for `Union<A, B>`.
pub struct UnionState<A: Automaton, B: Automaton>(A::State, B::State);

impl<A: Automaton, B: Automaton> Automaton for Union<A, B> {
    type State = UnionState<A, B>;

    fn start(&self) -> UnionState<A, B> {
        UnionState(self.0.start(), self.1.start())
    }

    fn is_match(&self, state: &UnionState<A, B>) -> bool {
        self.0.is_match(&state.0) || self.1.is_match(&state.1)
    }

    fn can_match(&self, state: &UnionState<A, B>) -> bool {
        self.0.can_match(&state.0) || self.1.can_match(&state.1)
    }

    fn will_always_match(&self, state: &UnionState<A, B>) -> bool {
        self.0.will_always_match(&state.0)
            || self.1.will_always_match(&state.1)
    }

    fn accept(&self, state: &UnionState<A, B>, byte: u8) -> UnionState<A, B> {
        UnionState(
            self.0.accept(&state.0, byte),
            self.1.accept(&state.1, byte),
        )
    }
}

impl<A: Automaton, B: Automaton> Clone for UnionState<A, B>
where
    A::State: Clone,
    B::State: Clone,
{
    fn clone(&self) -> UnionState<A, B> {
        UnionState(self.0.clone(), self.1.clone())
    }
}

/// An automaton that matches when both of its component automata match.
#[derive(Clone, Debug)]
pub struct Intersection<A, B>(A, B);

/// The `Automaton` state for `Intersection<A, B>`.
pub struct IntersectionState<A: Automaton, B: Automaton>(A::State, B::State);

impl<A: Automaton, B: Automaton> Automaton for Intersection<A, B> {
    type State = IntersectionState<A, B>;

    fn start(&self) -> IntersectionState<A, B> {
        IntersectionState(self.0.start(), self.1.start())
    }

    fn is_match(&self, state: &IntersectionState<A, B>) -> bool {
        self.0.is_match(&state.0) && self.1.is_match(&state.1)
    }

    fn can_match(&self, state: &IntersectionState<A, B>) -> bool {
        self.0.can_match(&state.0) && self.1.can_match(&state.1)
    }

    fn will_always_match(&self, state: &IntersectionState<A, B>) -> bool {
        self.0.will_always_match(&state.0)
            && self.1.will_always_match(&state.1)
    }

    fn accept(
        &self,
        state: &IntersectionState<A, B>,
        byte: u8,
    ) -> IntersectionState<A, B> {
        IntersectionState(
            self.0.accept(&state.0, byte),
            self.1.accept(&state.1, byte),
        )
    }
}

impl<A: Automaton, B: Automaton> Clone for IntersectionState<A, B>
where
    A::State: Clone,
    B::State: Clone,
{
    fn clone(&self) -> IntersectionState<A, B> {
        IntersectionState(self.0.clone(), self.1.clone())
    }
}

/// An automaton that matches exactly when the automaton it wraps does not.
///
/// Complementing `Str::new("os=").starts_with()` and intersecting it with
/// `AlwaysMatch` is how a tag filter expresses "every term except the `os`
/// tag".
#[derive(Clone, Debug)]
pub struct Complement<A>(A);

/// The `Automaton` state for `Complement<A>`.
pub struct ComplementState<A: Automaton>(A::State);

impl<A: Automaton> Automaton for Complement<A> {
    type State = ComplementState<A>;

    fn start(&self) -> ComplementState<A> {
        ComplementState(self.0.start())
    }

    fn is_match(&self, state: &ComplementState<A>) -> bool {
        !self.0.is_match(&state.0)
    }

    fn can_match(&self, state: &ComplementState<A>) -> bool {
        !self.0.will_always_match(&state.0)
    }

    fn will_always_match(&self, state: &ComplementState<A>) -> bool {
        !self.0.can_match(&state.0)
    }

    fn accept(
        &self,
        state: &ComplementState<A>,
        byte: u8,
    ) -> ComplementState<A> {
        ComplementState(self.0.accept(&state.0, byte))
    }

    fn accept_eof(
        &self,
        state: &ComplementState<A>,
    ) -> Option<ComplementState<A>> {
        self.0.accept_eof(&state.0).map(ComplementState)
    }
}

impl<A: Automaton> Clone for ComplementState<A>
where
    A::State: Clone,
{
    fn clone(&self) -> ComplementState<A> {
        ComplementState(self.0.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::{
        AlwaysMatch, Automaton, Complement, Str, Subsequence, Wildcard,
    };
    use crate::raw::Fst;
    use crate::stream::IntoStreamer;

    const TAGS: &[&str] = &[
        "dc=east",
        "dc=west",
        "host=db-01",
        "host=web-01",
        "host=web-02",
        "host=web-10",
        "os=linux",
    ];

    fn search<A: Automaton>(aut: A) -> Vec<String> {
        let fst = Fst::from_iter_set(TAGS).unwrap();
        fst.search(aut).into_stream().into_str_keys().unwrap()
    }

    fn run<A: Automaton>(aut: &A, input: &[u8]) -> A::State {
        let mut state = aut.start();
        for &b in input {
            state = aut.accept(&state, b);
        }
        state
    }

    #[test]
    fn always_match() {
        assert_eq!(search(AlwaysMatch).len(), TAGS.len());
    }

    #[test]
    fn str_exact() {
        assert_eq!(search(Str::new("host=web-02")), vec!["host=web-02"]);
        assert!(search(Str::new("host=web")).is_empty());
        assert!(search(Str::new("zz")).is_empty());
    }

    #[test]
    fn str_prefix() {
        assert_eq!(
            search(Str::new("host=web").starts_with()),
            vec!["host=web-01", "host=web-02", "host=web-10"]
        );
        assert_eq!(search(Str::new("").starts_with()).len(), TAGS.len());
    }

    #[test]
    fn str_from_bytes() {
        let aut = Str::from_bytes(b"dc=east");
        assert!(aut.is_match(&run(&aut, b"dc=east")));
        assert!(!aut.can_match(&run(&aut, b"dc=x")));
    }

    #[test]
    fn subsequence() {
        assert_eq!(search(Subsequence::new("dcw")), vec!["dc=west"]);
        assert_eq!(search(Subsequence::new("lnx")), vec!["os=linux"]);
    }

    #[test]
    fn wildcard_star() {
        assert_eq!(
            search(Wildcard::new("host=web-*")),
            vec!["host=web-01", "host=web-02", "host=web-10"]
        );
        assert_eq!(
            search(Wildcard::new("*-01")),
            vec!["host=db-01", "host=web-01"]
        );
        assert_eq!(search(Wildcard::new("*")).len(), TAGS.len());
    }

    #[test]
    fn wildcard_question() {
        assert_eq!(
            search(Wildcard::new("host=web-0?")),
            vec!["host=web-01", "host=web-02"]
        );
        assert_eq!(search(Wildcard::new("dc=??st")), vec!["dc=east", "dc=west"]);
        assert!(search(Wildcard::new("dc=?")).is_empty());
    }

    #[test]
    fn wildcard_states() {
        let aut = Wildcard::new("a*b");
        assert!(!aut.is_match(&aut.start()));
        assert!(aut.is_match(&run(&aut, b"ab")));
        assert!(aut.is_match(&run(&aut, b"axxb")));
        assert!(!aut.is_match(&run(&aut, b"axxbx")));
        assert!(aut.can_match(&run(&aut, b"axxbx")));
        assert!(!aut.can_match(&run(&aut, b"b")));

        let aut = Wildcard::new("a**");
        assert!(!aut.will_always_match(&aut.start()));
        assert!(aut.will_always_match(&run(&aut, b"a")));
        assert!(aut.is_match(&run(&aut, b"a")));
    }

    #[test]
    fn wildcard_empty_pattern() {
        let aut = Wildcard::new("");
        assert!(aut.is_match(&aut.start()));
        assert!(!aut.can_match(&run(&aut, b"x")));
    }

    #[test]
    fn union() {
        let aut = Str::new("dc=east").union(Str::new("os=").starts_with());
        assert_eq!(search(aut), vec!["dc=east", "os=linux"]);
    }

    #[test]
    fn intersection() {
        let aut = Str::new("host=").starts_with().intersection(Wildcard::new("*1"));
        assert_eq!(search(aut), vec!["host=db-01", "host=web-01"]);
    }

    #[test]
    fn complement() {
        let aut = Str::new("host=").starts_with().complement();
        assert_eq!(search(aut), vec!["dc=east", "dc=west", "os=linux"]);
    }

    #[test]
    fn complement_of_nothing_is_everything() {
        let aut: Complement<_> = Str::new("nope").complement();
        assert_eq!(search(aut).len(), TAGS.len());
    }

    #[test]
    fn by_reference() {
        let aut = Wildcard::new("dc=*");
        assert_eq!(search(&aut), vec!["dc=east", "dc=west"]);
        assert_eq!(search(&aut).len(), 2);
    }
}
