// Interactive secret entry for the terminal client.
//
// Prompts read from any `BufRead` and write to any `Write`, so the binary
// passes stdin/stdout and tests pass byte buffers.

use std::io::{self, BufRead, Write};

use duel_core::{Direction, Fleet, GameKind, Position, SecretLayout, ShipType, Word, BOARD_SIZE};
use rand::Rng;

use crate::visualize::{own_board_lines, render_board};

fn read_line<R: BufRead>(input: &mut R) -> io::Result<String> {
    let mut line = String::new();
    if input.read_line(&mut line)? == 0 {
        return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "input closed"));
    }
    Ok(line.trim().to_string())
}

/// Parses `x y H|V`.
pub fn parse_placement(line: &str) -> Result<(Position, Direction), String> {
    let parts: Vec<&str> = line.split_whitespace().collect();
    let [x, y, dir] = parts.as_slice() else {
        return Err("expected three tokens: x y H/V".into());
    };
    let x: u32 = x.parse().map_err(|_| format!("invalid x {:?}", x))?;
    let y: u32 = y.parse().map_err(|_| format!("invalid y {:?}", y))?;
    let dir = match dir.to_ascii_uppercase().as_str() {
        "H" => Direction::Horizontal,
        "V" => Direction::Vertical,
        _ => return Err("direction must be H or V".into()),
    };
    Ok((Position::new(x, y), dir))
}

/// Asks for manual or random placement and returns a complete fleet.
pub fn prompt_fleet<R: BufRead, W: Write, G: Rng + ?Sized>(
    input: &mut R,
    out: &mut W,
    rng: &mut G,
) -> io::Result<Fleet> {
    let mut fleet = Fleet::new();
    writeln!(out, "Place your ships on a {0}x{0} board, coordinates 0..{1}.", BOARD_SIZE, BOARD_SIZE - 1)?;

    loop {
        write!(out, "Placement mode, (M)anual or (R)andom: ")?;
        out.flush()?;
        match read_line(input)?.to_ascii_uppercase().as_str() {
            "R" | "RANDOM" => {
                if fleet.place_ships_randomly(rng) {
                    writeln!(out, "{}", render_board(&own_board_lines(&fleet, 0)))?;
                    return Ok(fleet);
                }
                writeln!(out, "Random placement failed, place the ships manually.")?;
                break;
            }
            "M" | "MANUAL" => break,
            _ => writeln!(out, "Enter M or R.")?,
        }
    }

    for ship in ShipType::ALL {
        loop {
            write!(out, "Place {:?} (size {}) as x y H/V: ", ship, ship.size())?;
            out.flush()?;
            let (pos, dir) = match parse_placement(&read_line(input)?) {
                Ok(p) => p,
                Err(e) => {
                    writeln!(out, "{}", e)?;
                    continue;
                }
            };
            if !fleet.place_ship(ship, pos, dir) {
                writeln!(out, "Out of bounds or overlapping, try again.")?;
                continue;
            }
            writeln!(out, "{}", render_board(&own_board_lines(&fleet, 0)))?;
            break;
        }
    }
    Ok(fleet)
}

pub fn prompt_word<R: BufRead, W: Write>(input: &mut R, out: &mut W) -> io::Result<Word> {
    loop {
        write!(out, "Secret five-letter word: ")?;
        out.flush()?;
        match read_line(input)?.parse::<Word>() {
            Ok(word) => return Ok(word),
            Err(e) => writeln!(out, "{}", e)?,
        }
    }
}

pub fn prompt_layout<R: BufRead, W: Write, G: Rng + ?Sized>(
    kind: GameKind,
    input: &mut R,
    out: &mut W,
    rng: &mut G,
) -> io::Result<SecretLayout> {
    Ok(match kind {
        GameKind::Battleship => SecretLayout::Fleet(prompt_fleet(input, out, rng)?),
        GameKind::Wordle => SecretLayout::Word(prompt_word(input, out)?),
    })
}
