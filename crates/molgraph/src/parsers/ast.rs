//! Grammar (shared between SMILES and pattern text):
//!
//! smiles        = chain , { "." , chain } ;
//! chain         = branched atom , { [ bond ] , branched atom } ;
//! branched atom = atom , { ring bond } , { branch } ;
//! branch        = "(" , [ bond ] , chain , ")" ;
//! ring bond     = [ bond ] , ( digit | "%" , digit , digit ) ;
//! bond          = "-" | "=" | "#" | ":" ;
//! atom          = bracket atom | bare atom ;

use nom::IResult;
use nom::branch::alt;
use nom::bytes::complete::tag;
use nom::character::complete::{char, digit1, one_of, satisfy, u8, u32};
use nom::combinator::{map, map_res, opt, recognize, value};
use nom::multi::{many0, many0_count, separated_list1};
use nom::sequence::{delimited, pair, preceded};

use crate::element;

#[derive(Clone, Debug)]
pub(super) struct SmilesAst {
    pub(super) chains: Vec<Chain>,
}

#[derive(Clone, Debug)]
pub(super) struct Chain {
    pub(super) first: Branched,
    pub(super) tail: Vec<Link>,
}

#[derive(Clone, Debug)]
pub(super) struct Link {
    pub(super) bond: Option<BondTok>,
    pub(super) atom: Branched,
}

#[derive(Clone, Debug)]
pub(super) struct Branched {
    pub(super) atom: AtomTok,
    pub(super) rings: Vec<RingTok>,
    pub(super) branches: Vec<Branch>,
}

#[derive(Clone, Debug)]
pub(super) struct Branch {
    pub(super) bond: Option<BondTok>,
    pub(super) chain: Chain,
}

#[derive(Copy, Clone, Debug)]
pub(super) struct RingTok {
    pub(super) bond: Option<BondTok>,
    pub(super) number: u16,
}

#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub(super) enum BondTok {
    Single,
    Double,
    Triple,
    Aromatic,
}

#[derive(Copy, Clone, Debug)]
pub(super) struct AtomTok {
    pub(super) bracket: bool,
    pub(super) element: ElementTok,
    pub(super) hydrogens: Option<u8>,
    pub(super) charge: Option<i8>,
    pub(super) map_num: u32,
}

#[derive(Copy, Clone, Debug)]
pub(super) enum ElementTok {
    Symbol {
        atomic_num: u8,
        /// `None` leaves aromaticity unconstrained (atomic-number queries)
        aromatic: Option<bool>,
    },
    Wildcard,
}

pub(super) fn smiles(i: &str) -> IResult<&str, SmilesAst> {
    map(separated_list1(char('.'), chain), |chains| SmilesAst {
        chains,
    })(i)
}

fn chain(i: &str) -> IResult<&str, Chain> {
    let (i, first) = branched(i)?;
    let (i, tail) = many0(link)(i)?;
    Ok((i, Chain { first, tail }))
}

fn link(i: &str) -> IResult<&str, Link> {
    map(pair(opt(bond), branched), |(bond, atom)| Link { bond, atom })(i)
}

fn branched(i: &str) -> IResult<&str, Branched> {
    let (i, atom) = atom(i)?;
    let (i, rings) = many0(ring_bond)(i)?;
    let (i, branches) = many0(branch)(i)?;
    Ok((
        i,
        Branched {
            atom,
            rings,
            branches,
        },
    ))
}

fn branch(i: &str) -> IResult<&str, Branch> {
    map(
        delimited(char('('), pair(opt(bond), chain), char(')')),
        |(bond, chain)| Branch { bond, chain },
    )(i)
}

fn ring_bond(i: &str) -> IResult<&str, RingTok> {
    let (i, bond) = opt(bond)(i)?;
    let (i, number) = alt((
        preceded(char('%'), two_digit_number),
        map(satisfy(|c| c.is_ascii_digit()), |c| {
            u16::from(c as u8 - b'0')
        }),
    ))(i)?;
    Ok((i, RingTok { bond, number }))
}

fn two_digit_number(i: &str) -> IResult<&str, u16> {
    let (i, tens) = satisfy(|c| c.is_ascii_digit())(i)?;
    let (i, ones) = satisfy(|c| c.is_ascii_digit())(i)?;
    let number = u16::from(tens as u8 - b'0') * 10 + u16::from(ones as u8 - b'0');
    Ok((i, number))
}

fn bond(i: &str) -> IResult<&str, BondTok> {
    map(one_of("-=#:"), |c| match c {
        '-' => BondTok::Single,
        '=' => BondTok::Double,
        '#' => BondTok::Triple,
        ':' => BondTok::Aromatic,
        _ => unreachable!(),
    })(i)
}

fn atom(i: &str) -> IResult<&str, AtomTok> {
    alt((
        bracket_atom,
        map(bare_element, |element| AtomTok {
            bracket: false,
            element,
            hydrogens: None,
            charge: None,
            map_num: 0,
        }),
    ))(i)
}

fn bare_element(i: &str) -> IResult<&str, ElementTok> {
    alt((
        map(alt((tag("Cl"), tag("Br"))), |s: &str| known_symbol(s, false)),
        map(one_of("BCNOPSFI"), |c| {
            known_symbol(&c.to_string(), false)
        }),
        map(one_of("bcnops"), |c| {
            known_symbol(&c.to_ascii_uppercase().to_string(), true)
        }),
        value(ElementTok::Wildcard, char('*')),
    ))(i)
}

// SAFETY: only called with symbols the grammar itself restricts to table entries
fn known_symbol(symbol: &str, aromatic: bool) -> ElementTok {
    ElementTok::Symbol {
        atomic_num: element::by_symbol(symbol).unwrap().atomic_num,
        aromatic: Some(aromatic),
    }
}

fn bracket_atom(i: &str) -> IResult<&str, AtomTok> {
    delimited(char('['), bracket_body, char(']'))(i)
}

fn bracket_body(i: &str) -> IResult<&str, AtomTok> {
    let (i, _isotope) = opt(digit1)(i)?;
    let (i, element) = bracket_element(i)?;
    let (i, _chirality) = opt(alt((tag("@@"), tag("@"))))(i)?;
    let (i, hydrogens) = opt(hydrogen_count)(i)?;
    let (i, charge) = opt(charge)(i)?;
    let (i, map_num) = opt(preceded(char(':'), u32))(i)?;
    Ok((
        i,
        AtomTok {
            bracket: true,
            element,
            hydrogens,
            charge,
            map_num: map_num.unwrap_or(0),
        },
    ))
}

fn bracket_element(i: &str) -> IResult<&str, ElementTok> {
    alt((
        value(ElementTok::Wildcard, char('*')),
        // R-group spellings used by reaction-file exports
        value(ElementTok::Wildcard, preceded(char('R'), opt(digit1))),
        // [#6]-style atomic-number queries leave aromaticity unconstrained
        map_res(preceded(char('#'), u8), |n| {
            if n == element::WILDCARD {
                return Ok(ElementTok::Wildcard);
            }
            element::by_number(n)
                .map(|e| ElementTok::Symbol {
                    atomic_num: e.atomic_num,
                    aromatic: None,
                })
                .ok_or("unknown atomic number")
        }),
        map_res(
            recognize(pair(
                satisfy(|c| c.is_ascii_uppercase()),
                opt(satisfy(|c| c.is_ascii_lowercase())),
            )),
            |symbol| {
                element::by_symbol(symbol).map(|e| ElementTok::Symbol {
                    atomic_num: e.atomic_num,
                    aromatic: Some(false),
                })
            },
        ),
        map_res(
            recognize(satisfy(|c| c.is_ascii_lowercase())),
            |symbol: &str| {
                element::by_aromatic_symbol(symbol).map(|e| ElementTok::Symbol {
                    atomic_num: e.atomic_num,
                    aromatic: Some(true),
                })
            },
        ),
    ))(i)
}

fn hydrogen_count(i: &str) -> IResult<&str, u8> {
    map(preceded(char('H'), opt(u8)), |count| count.unwrap_or(1))(i)
}

fn charge(i: &str) -> IResult<&str, i8> {
    let (i, sign) = one_of("+-")(i)?;
    let (i, magnitude) = alt((
        u8,
        map(many0_count(char(sign)), |repeats| (repeats + 1) as u8),
    ))(i)?;
    let charge = i8::try_from(magnitude).unwrap_or(i8::MAX);
    Ok((i, if sign == '-' { -charge } else { charge }))
}
