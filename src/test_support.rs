//! Scripted transport and fixtures for unit tests

use std::collections::VecDeque;
use std::sync::Mutex;

use crate::error::{GuideError, Result};
use crate::upstream::{HttpReply, Transport};

#[derive(Debug, Clone)]
enum Scripted {
    Reply(HttpReply),
    Fail(String),
}

/// A recorded outbound request
#[derive(Debug, Clone)]
pub struct Call {
    pub url: String,
    pub query: Vec<(String, String)>,
    pub headers: Vec<(String, String)>,
}

impl Call {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn query_value(&self, name: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }
}

/// Routes requests by URL substring. Each route answers from a queue; the last
/// queued answer repeats once the queue is down to one entry.
#[derive(Default)]
pub struct MockTransport {
    routes: Mutex<Vec<(String, VecDeque<Scripted>)>>,
    calls: Mutex<Vec<Call>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&self, pattern: &str, answer: Scripted) {
        let mut routes = self.routes.lock().unwrap();
        match routes.iter_mut().find(|(p, _)| p == pattern) {
            Some((_, queue)) => queue.push_back(answer),
            None => routes.push((pattern.to_string(), VecDeque::from([answer]))),
        }
    }

    pub fn respond(&self, pattern: &str, status: u16, body: &str) {
        self.push(
            pattern,
            Scripted::Reply(HttpReply {
                status,
                body: body.to_string(),
            }),
        );
    }

    pub fn fail(&self, pattern: &str, message: &str) {
        self.push(pattern, Scripted::Fail(message.to_string()));
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_to(&self, pattern: &str) -> Vec<Call> {
        self.calls()
            .into_iter()
            .filter(|c| c.url.contains(pattern))
            .collect()
    }
}

impl Transport for MockTransport {
    fn get(&self, url: &str, query: &[(&str, String)], headers: &[(&str, String)]) -> Result<HttpReply> {
        self.calls.lock().unwrap().push(Call {
            url: url.to_string(),
            query: query.iter().map(|(k, v)| (k.to_string(), v.clone())).collect(),
            headers: headers.iter().map(|(k, v)| (k.to_string(), v.clone())).collect(),
        });

        let mut routes = self.routes.lock().unwrap();
        let queue = routes
            .iter_mut()
            .find(|(pattern, _)| url.contains(pattern.as_str()))
            .map(|(_, queue)| queue)
            .unwrap_or_else(|| panic!("no scripted response for {}", url));

        let answer = if queue.len() > 1 {
            queue.pop_front().unwrap()
        } else {
            queue.front().cloned().unwrap()
        };

        match answer {
            Scripted::Reply(reply) => Ok(reply),
            Scripted::Fail(message) => Err(GuideError::Transport(message)),
        }
    }
}

pub const BOOT_OK: &str = r#"{"sessionToken":"token-1","stitcherParams":"a=1&b=2"}"#;

pub fn channels_json() -> String {
    r#"{"data":[
        {"id":"c1","name":"Pluto News","slug":"pluto-news","tmsid":"111","number":10,
         "images":[{"type":"featuredImage","url":"http://img/f1.jpg"},{"type":"colorLogoPNG","url":"http://img/c1.png"}]},
        {"id":"c2","name":"Classic Movies","slug":"classic-movies","number":10,
         "images":[{"type":"colorLogoPNG","url":"http://img/c2.png"}]},
        {"id":"c3","name":"Cartoons","slug":"cartoons","number":11,"images":[]}
    ]}"#
    .to_string()
}

pub fn categories_json() -> String {
    r#"{"data":[
        {"name":"News","channelIDs":["c1"]},
        {"name":"Movies","channelIDs":["c2"]}
    ]}"#
    .to_string()
}

pub fn timelines_json(end: &str) -> String {
    format!(
        r#"{{"meta":{{"startDateTime":"2024-01-15T12:00:00.000Z","endDateTime":"{end}"}},
        "data":[
          {{"channelId":"c1","timelines":[
            {{"start":"2024-01-15T12:00:00.000Z","stop":"2024-01-15T12:30:00.000Z","title":"Morning Report",
              "episode":{{"_id":"ep1","name":"January 15","number":3,"season":2,
                "description":"The &quot;big&quot; story","genre":"News and Information","subGenre":"General News",
                "clip":{{"originalReleaseDate":"2023-12-01T08:00:00.000Z"}},
                "series":{{"_id":"s1","type":"tv","tile":{{"path":"http://img/s1.jpg"}}}}}}}}
          ]}},
          {{"channelId":"c2","timelines":[
            {{"start":"2024-01-15T12:00:00.000Z","stop":"2024-01-15T14:00:00.000Z","title":"The Big Film",
              "episode":{{"_id":"ep2","name":"The Big Film","description":"A film.","genre":"Westerns",
                "clip":{{"originalReleaseDate":"1960-05-01T00:00:00.000Z"}},
                "series":{{"_id":"s2","type":"film","tile":{{"path":"http://img/s2.jpg"}}}}}}}}
          ]}}
        ]}}"#
    )
}
