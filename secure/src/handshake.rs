use std::io::{Read, Write};

use aes::Aes256;
use cfb_mode::cipher::KeyIvInit;
use cfb_mode::{BufDecryptor, BufEncryptor};
use hmac::{Hmac, Mac};
use rand::RngCore;
use sha2::Sha256;

use crate::Error;

// fixed key size in bytes, also the salt size on the wire
pub const KEY_SIZE: usize = 32;

// rounds of iteration for pbkdf2
pub const KEY_ITERATIONS: u32 = 4096;

// aes block size, the iv size on the wire
pub const BLOCK_SIZE: usize = 16;

// sha256 output, the signature size on the wire
const SIGNATURE_SIZE: usize = 32;

// [iv] + [salt] + [signature], sent in the clear before any ciphertext
pub const HEADER_SIZE: usize = BLOCK_SIZE + KEY_SIZE + SIGNATURE_SIZE;

type HmacSha256 = Hmac<Sha256>;

/// Keystream state for the sending direction of a connection. The
/// keystream advances by exactly the number of bytes passed to `xor`,
/// independent of how many of them later make it onto the wire.
pub struct Encrypter {
    cipher: BufEncryptor<Aes256>,
}

impl Encrypter {
    pub fn xor(&mut self, buf: &mut [u8]) {
        self.cipher.encrypt(buf);
    }
}

/// Keystream state for the receiving direction of a connection.
pub struct Decrypter {
    cipher: BufDecryptor<Aes256>,
}

impl Decrypter {
    pub fn xor(&mut self, buf: &mut [u8]) {
        self.cipher.decrypt(buf);
    }
}

// derive_keys stretches the password into the per-session key material.
// The first half keys the cipher, the second half keys the hmac.
fn derive_keys(password: &[u8], salt: &[u8]) -> ([u8; KEY_SIZE], [u8; KEY_SIZE]) {
    let mut key_material = [0u8; 2 * KEY_SIZE];
    pbkdf2::pbkdf2_hmac::<Sha256>(password, salt, KEY_ITERATIONS, &mut key_material);

    let mut aes_key = [0u8; KEY_SIZE];
    let mut hmac_key = [0u8; KEY_SIZE];
    aes_key.copy_from_slice(&key_material[..KEY_SIZE]);
    hmac_key.copy_from_slice(&key_material[KEY_SIZE..]);
    (aes_key, hmac_key)
}

fn keyed_hmac(hmac_key: &[u8; KEY_SIZE]) -> HmacSha256 {
    HmacSha256::new_from_slice(hmac_key).expect("hmac accepts keys of any size")
}

/// Generates and writes the 80 byte handshake header, returning the
/// encrypter for everything sent afterwards. The header is written with
/// complete-write semantics; any failure leaves the connection unusable
/// for sending.
pub fn send_handshake<W: Write>(w: &mut W, password: &[u8]) -> Result<Encrypter, Error> {
    // the signature slot is random until we overwrite it below
    let mut header = [0u8; HEADER_SIZE];
    rand::thread_rng().fill_bytes(&mut header);

    let (aes_key, hmac_key) = derive_keys(password, &header[BLOCK_SIZE..BLOCK_SIZE + KEY_SIZE]);

    // sign iv and salt and put the signature in the header
    let mut mac = keyed_hmac(&hmac_key);
    mac.update(&header[..BLOCK_SIZE + KEY_SIZE]);
    let signature = mac.finalize().into_bytes();
    header[BLOCK_SIZE + KEY_SIZE..].copy_from_slice(signature.as_slice());

    log::debug!(
        "sending encryption handshake: iv = {}, salt = {}, signature = {}",
        hex::encode(&header[..BLOCK_SIZE]),
        hex::encode(&header[BLOCK_SIZE..BLOCK_SIZE + KEY_SIZE]),
        hex::encode(&header[BLOCK_SIZE + KEY_SIZE..]),
    );

    let mut iv = [0u8; BLOCK_SIZE];
    iv.copy_from_slice(&header[..BLOCK_SIZE]);
    let cipher = BufEncryptor::<Aes256>::new(&aes_key.into(), &iv.into());

    w.write_all(&header)?;
    Ok(Encrypter { cipher })
}

/// Reads and validates the peer's 80 byte handshake header, returning the
/// decrypter for everything received afterwards. The signature comparison
/// is constant-time; on mismatch no decrypted byte is ever surfaced.
pub fn receive_handshake<R: Read>(r: &mut R, password: &[u8]) -> Result<Decrypter, Error> {
    let mut header = [0u8; HEADER_SIZE];
    r.read_exact(&mut header)?;

    let (aes_key, hmac_key) = derive_keys(password, &header[BLOCK_SIZE..BLOCK_SIZE + KEY_SIZE]);

    log::debug!(
        "received encryption handshake: iv = {}, salt = {}, signature = {}",
        hex::encode(&header[..BLOCK_SIZE]),
        hex::encode(&header[BLOCK_SIZE..BLOCK_SIZE + KEY_SIZE]),
        hex::encode(&header[BLOCK_SIZE + KEY_SIZE..]),
    );

    // recompute the signature over iv and salt and validate the header
    let mut mac = keyed_hmac(&hmac_key);
    mac.update(&header[..BLOCK_SIZE + KEY_SIZE]);
    mac.verify_slice(&header[BLOCK_SIZE + KEY_SIZE..])
        .map_err(|_| Error::InvalidPassword)?;

    let mut iv = [0u8; BLOCK_SIZE];
    iv.copy_from_slice(&header[..BLOCK_SIZE]);
    Ok(Decrypter {
        cipher: BufDecryptor::<Aes256>::new(&aes_key.into(), &iv.into()),
    })
}
