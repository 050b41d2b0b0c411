use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::thread;

use aes::Aes256;
use cfb_mode::cipher::KeyIvInit;
use cfb_mode::BufDecryptor;
use hmac::{Hmac, Mac};
use sha2::Sha256;

use super::handshake::{
    receive_handshake, send_handshake, BLOCK_SIZE, HEADER_SIZE, KEY_ITERATIONS, KEY_SIZE,
};
use super::Error;

fn tcp_pair() -> (TcpStream, TcpStream) {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    let connected = TcpStream::connect(addr).unwrap();
    let (accepted, _) = listener.accept().unwrap();
    (connected, accepted)
}

#[test]
fn header_is_80_plaintext_bytes_with_valid_signature() {
    let password = b"hunter2";
    let (mut near, mut far) = tcp_pair();

    let sender = thread::spawn(move || {
        let mut encrypter = send_handshake(&mut near, password).unwrap();
        let mut payload = b"hello".to_vec();
        encrypter.xor(&mut payload);
        near.write_all(&payload).unwrap();
    });

    // sniff the header off the wire before any decryption happens
    let mut header = [0u8; HEADER_SIZE];
    far.read_exact(&mut header).unwrap();
    sender.join().unwrap();

    let iv = &header[..BLOCK_SIZE];
    let salt = &header[BLOCK_SIZE..BLOCK_SIZE + KEY_SIZE];
    let signature = &header[BLOCK_SIZE + KEY_SIZE..];

    // signature == hmac-sha256(pbkdf2(password, salt, 4096, 64)[32..], iv || salt)
    let mut key_material = [0u8; 2 * KEY_SIZE];
    pbkdf2::pbkdf2_hmac::<Sha256>(password, salt, KEY_ITERATIONS, &mut key_material);
    let mut mac = Hmac::<Sha256>::new_from_slice(&key_material[KEY_SIZE..]).unwrap();
    mac.update(&header[..BLOCK_SIZE + KEY_SIZE]);
    assert_eq!(mac.finalize().into_bytes().as_slice(), signature);

    // the bytes after the header decrypt under the derived key and iv
    let mut ciphertext = [0u8; 5];
    far.read_exact(&mut ciphertext).unwrap();
    let mut cipher = BufDecryptor::<Aes256>::new_from_slices(&key_material[..KEY_SIZE], iv).unwrap();
    cipher.decrypt(&mut ciphertext);
    assert_eq!(&ciphertext, b"hello");
}

#[test]
fn receive_rejects_wrong_password() {
    let (mut near, mut far) = tcp_pair();

    let sender = thread::spawn(move || {
        send_handshake(&mut near, b"hunter2").unwrap();
    });

    match receive_handshake(&mut far, b"hunter3") {
        Err(Error::InvalidPassword) => {}
        other => panic!("expected invalid password, got {:?}", other.map(|_| ())),
    }
    sender.join().unwrap();
}

#[test]
fn handshake_keys_both_directions_independently() {
    let (mut near, mut far) = tcp_pair();
    let password = b"correct horse battery staple";

    let peer = thread::spawn(move || {
        let mut encrypter = send_handshake(&mut far, password).unwrap();
        let mut decrypter = receive_handshake(&mut far, password).unwrap();

        let mut buf = [0u8; 3];
        far.read_exact(&mut buf).unwrap();
        decrypter.xor(&mut buf);
        assert_eq!(&buf, b"png");

        let mut reply = b"ack".to_vec();
        encrypter.xor(&mut reply);
        far.write_all(&reply).unwrap();
    });

    let mut encrypter = send_handshake(&mut near, password).unwrap();
    let mut ping = b"png".to_vec();
    encrypter.xor(&mut ping);
    near.write_all(&ping).unwrap();

    let mut decrypter = receive_handshake(&mut near, password).unwrap();
    let mut buf = [0u8; 3];
    near.read_exact(&mut buf).unwrap();
    decrypter.xor(&mut buf);
    assert_eq!(&buf, b"ack");

    peer.join().unwrap();
}
