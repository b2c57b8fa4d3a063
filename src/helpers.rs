use crate::common::{Color, ColorValue};

// Expand a 5-bit console color channel (0-31) to 8 bits.
pub fn scale_color(c: u8) -> u8 {
    ((c as u16) * 255 / 31) as u8
}

// Reduce an 8-bit channel to the console's 5-bit range.
pub fn unscale_color(c: ColorValue) -> u8 {
    c >> 3
}

pub fn color_from_bgr555(w: u16) -> Color {
    Color::new(
        scale_color((w & 31) as u8),
        scale_color(((w >> 5) & 31) as u8),
        scale_color(((w >> 10) & 31) as u8),
    )
}

pub fn color_to_bgr555(c: Color) -> u16 {
    let r = unscale_color(c.red) as u16;
    let g = unscale_color(c.green) as u16;
    let b = unscale_color(c.blue) as u16;
    r | g << 5 | b << 10
}

/// All integer divisors of `n` in ascending order.
pub fn divisors(n: usize) -> Vec<usize> {
    let mut small = vec![];
    let mut large = vec![];
    let mut i = 1;
    while i * i <= n {
        if n % i == 0 {
            small.push(i);
            if i * i != n {
                large.push(n / i);
            }
        }
        i += 1;
    }
    small.extend(large.into_iter().rev());
    small
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn divisors_are_sorted_and_complete() {
        assert_eq!(divisors(12), vec![1, 2, 3, 4, 6, 12]);
        assert_eq!(divisors(16), vec![1, 2, 4, 8, 16]);
        assert_eq!(divisors(7), vec![1, 7]);
        assert_eq!(divisors(1), vec![1]);
        assert!(divisors(0).is_empty());
    }

    #[test]
    fn bgr555_keeps_five_bit_channels() {
        let c = Color::new(0xF8, 0x80, 0x08);
        let w = color_to_bgr555(c);
        assert_eq!(w, 31 | 16 << 5 | 1 << 10);
        let back = color_from_bgr555(w);
        assert_eq!(back.red, 255);
        assert_eq!(color_to_bgr555(back), w);
    }
}
